//! The background code-discovery engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use burin_asm::Arch;
use burin_image::{Image, ImageObserver};
use tracing::{debug, trace};

use crate::function::Function;
use crate::instr::{FunctionInfo, RenderContext};

/// Display options applied while rendering instruction text.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Prepend an eight-hex-digit address column to every instruction.
    pub show_address: bool,
}

struct AnalysisState {
    functions: BTreeMap<u64, Function>,
    queue: Vec<u64>,
    status: String,
    update_id: u64,
    options: RenderOptions,
}

struct AnalysisShared {
    image: Arc<Image>,
    arch: Option<Arch>,
    state: Mutex<AnalysisState>,
    run: AtomicBool,
    update_request: AtomicBool,
}

/// Incremental function discovery over one image. One worker thread per
/// instance; all state sits behind a single coarse lock.
pub struct Analysis {
    shared: Arc<AnalysisShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn function_infos(functions: &BTreeMap<u64, Function>) -> BTreeMap<u64, FunctionInfo> {
    functions
        .iter()
        .map(|(&entry, f)| {
            (
                entry,
                FunctionInfo {
                    name: f.name.clone(),
                    plt: f.plt,
                },
            )
        })
        .collect()
}

impl AnalysisShared {
    fn lock(&self) -> MutexGuard<'_, AnalysisState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Analyze one function entry: discover blocks, publish, and return the
    // callees found. One indivisible unit under the lock.
    fn analyze_function(&self, entry: u64, name: Option<String>) {
        let arch = match self.arch {
            Some(arch) if arch.is_disassemblable() => arch,
            _ => return,
        };
        let mut st = self.lock();
        st.status = format!("Disassembling function at 0x{entry:08x}...");
        debug!("analyzing function at {entry:#x}");

        let mut func = match st.functions.remove(&entry) {
            Some(func) => func,
            None => {
                let name = name.or_else(|| self.image.symbol_by_addr(entry));
                Function::new(entry, name)
            }
        };

        let infos = {
            let mut infos = function_infos(&st.functions);
            infos.insert(
                entry,
                FunctionInfo {
                    name: func.name.clone(),
                    plt: func.plt,
                },
            );
            infos
        };
        st.update_id += 1;
        let update_id = st.update_id;
        let options = st.options.clone();
        let ctx = RenderContext {
            functions: &infos,
            image: &self.image,
            options: &options,
        };
        func.find_basic_blocks(&self.image, arch, &ctx, update_id);
        let calls = func.find_calls(&self.image);
        func.ready = true;
        st.functions.insert(entry, func);

        for call in calls {
            if !st.functions.contains_key(&call) && !st.queue.contains(&call) {
                trace!("queueing callee at {call:#x}");
                st.queue.push(call);
            }
        }
    }

    // Re-render one function against the current symbol table.
    fn update_function(&self, entry: u64) {
        let mut st = self.lock();
        st.status = format!("Updating function at 0x{entry:08x}...");
        let infos = function_infos(&st.functions);
        let options = st.options.clone();
        let ctx = RenderContext {
            functions: &infos,
            image: &self.image,
            options: &options,
        };
        st.update_id += 1;
        let next_id = st.update_id;
        if let Some(func) = st.functions.get_mut(&entry) {
            if func.update(&ctx) {
                func.update_id = next_id;
            }
        }
    }

    fn worker_loop(&self) {
        if let Some(entry) = self.image.entry() {
            self.analyze_function(entry, Some("_start".to_string()));
        }

        while self.run.load(Ordering::SeqCst) {
            loop {
                if !self.run.load(Ordering::SeqCst) {
                    return;
                }
                let entry = match self.lock().queue.pop() {
                    Some(entry) => entry,
                    None => break,
                };
                self.analyze_function(entry, None);
                // Give other threads a chance to take the lock.
                std::thread::sleep(Duration::from_millis(1));
            }

            // Re-render so function names referenced before discovery
            // pick up their final text.
            self.update_request.store(false, Ordering::SeqCst);
            let entries: Vec<u64> = self.lock().functions.keys().copied().collect();
            for entry in entries {
                if !self.run.load(Ordering::SeqCst) {
                    return;
                }
                self.update_function(entry);
                std::thread::sleep(Duration::from_millis(1));
            }

            self.lock().status = String::new();
            while self.lock().queue.is_empty()
                && !self.update_request.load(Ordering::SeqCst)
                && self.run.load(Ordering::SeqCst)
            {
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

impl ImageObserver for AnalysisShared {
    // A byte changed under some decoded instruction: queue the containing
    // functions for re-analysis. This is the only path that re-analyzes a
    // known function.
    fn data_written(&self, vaddr: u64, contents: &[u8]) {
        let mut st = self.lock();
        let start = vaddr;
        let end = vaddr + contents.len() as u64;

        let mut touched = Vec::new();
        for func in st.functions.values() {
            'func: for block in func.blocks.values() {
                for instr in &block.instrs {
                    let instr_end = instr.addr + instr.opcode.len() as u64;
                    if end > instr.addr && start < instr_end {
                        touched.push(func.entry);
                        break 'func;
                    }
                }
            }
        }
        for entry in touched {
            if !st.queue.contains(&entry) {
                trace!("bytes changed under {entry:#x}, re-queueing");
                st.queue.push(entry);
            }
        }
    }
}

impl Analysis {
    /// Create an engine over an image. Call [`Analysis::start`] to launch
    /// the background worker, or drive it synchronously with
    /// [`Analysis::analyze_entry_point`] and [`Analysis::process_queue`].
    pub fn new(image: Arc<Image>) -> Arc<Analysis> {
        let arch = image.arch();
        let shared = Arc::new(AnalysisShared {
            image: image.clone(),
            arch,
            state: Mutex::new(AnalysisState {
                functions: BTreeMap::new(),
                queue: Vec::new(),
                status: String::new(),
                update_id: 0,
                options: RenderOptions::default(),
            }),
            run: AtomicBool::new(true),
            update_request: AtomicBool::new(false),
        });
        let observer: Arc<dyn ImageObserver> = shared.clone();
        image.add_observer(&observer);
        Arc::new(Analysis {
            shared,
            worker: Mutex::new(None),
        })
    }

    /// Launch the background worker thread.
    pub fn start(&self) {
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || shared.worker_loop());
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Ask the worker to stop and wait for it to drain its current unit.
    pub fn stop(&self) {
        self.shared.run.store(false, Ordering::SeqCst);
        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Analyze the image entry point synchronously as `_start`.
    pub fn analyze_entry_point(&self) {
        if let Some(entry) = self.shared.image.entry() {
            self.shared.analyze_function(entry, Some("_start".to_string()));
        }
    }

    /// Analyze one address synchronously and queue its callees.
    pub fn analyze_at(&self, entry: u64) {
        self.shared.analyze_function(entry, None);
    }

    /// Drain the discovery queue synchronously.
    pub fn process_queue(&self) {
        loop {
            let entry = self.shared.lock().queue.pop();
            match entry {
                Some(entry) => self.shared.analyze_function(entry, None),
                None => break,
            }
        }
    }

    /// Re-render every function synchronously.
    pub fn update_all(&self) {
        self.shared.update_request.store(false, Ordering::SeqCst);
        let entries: Vec<u64> = self.shared.lock().functions.keys().copied().collect();
        for entry in entries {
            self.shared.update_function(entry);
        }
    }

    /// Number of entries waiting in the discovery queue.
    pub fn queue_len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Current worker status line.
    pub fn status(&self) -> String {
        self.shared.lock().status.clone()
    }

    /// Run `f` against the function map.
    pub fn with_functions<R>(&self, f: impl FnOnce(&BTreeMap<u64, Function>) -> R) -> R {
        f(&self.shared.lock().functions)
    }

    /// Linear scan for the instruction containing (or exactly starting
    /// at) `addr`; returns `(function_entry, instruction_addr)`.
    pub fn find_instr(&self, addr: u64, exact_match: bool) -> Option<(u64, u64)> {
        let st = self.shared.lock();
        for func in st.functions.values() {
            for block in func.blocks.values() {
                for instr in &block.instrs {
                    let hit = if exact_match {
                        addr == instr.addr
                    } else {
                        addr >= instr.addr && addr < instr.addr + instr.opcode.len() as u64
                    };
                    if hit {
                        return Some((func.entry, instr.addr));
                    }
                }
            }
        }
        None
    }

    /// Define a symbol, renaming the function at that address if any, and
    /// request a re-render pass.
    pub fn create_symbol(&self, addr: u64, name: &str) {
        let mut st = self.shared.lock();
        self.shared.image.create_symbol(addr, name);
        if let Some(func) = st.functions.get_mut(&addr) {
            func.rename(name);
        }
        self.shared.update_request.store(true, Ordering::SeqCst);
    }

    /// Remove a symbol; the function at that address reverts to its
    /// `sub_` name.
    pub fn undefine_symbol(&self, addr: u64, name: &str) {
        let mut st = self.shared.lock();
        self.shared.image.delete_symbol(addr, name);
        if let Some(func) = st.functions.get_mut(&addr) {
            func.rename(&format!("sub_{addr:08x}"));
        }
        self.shared.update_request.store(true, Ordering::SeqCst);
    }

    /// Toggle the address column and request a re-render pass.
    pub fn set_address_view(&self, on: bool) {
        self.shared.lock().options.show_address = on;
        self.shared.update_request.store(true, Ordering::SeqCst);
    }

    /// Whether a re-render pass is pending.
    pub fn update_requested(&self) -> bool {
        self.shared.update_request.load(Ordering::SeqCst)
    }
}

impl Drop for Analysis {
    fn drop(&mut self) {
        self.stop();
    }
}
