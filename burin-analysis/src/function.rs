//! Basic blocks and function discovery.

use std::collections::{BTreeMap, HashMap};

use burin_asm::Arch;
use burin_image::{AddressSpace, Image};
use itertools::Itertools;

use crate::instr::{DisasmInstr, RenderContext};
use crate::text::{InstructionText, Span, Token, TokenColor, TokenKind};

/// A maximal straight-line run of instructions with one entry and one set
/// of successor edges. Edges are held as entry addresses, never as block
/// references.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    /// Entry address.
    pub entry: u64,
    /// Successor block entries.
    pub exits: Vec<u64>,
    /// Predecessor block entries.
    pub prev: Vec<u64>,
    /// Taken edge of a terminating conditional branch.
    pub true_path: Option<u64>,
    /// Fall-through edge of a terminating conditional branch.
    pub false_path: Option<u64>,
    /// Instructions in address order.
    pub instrs: Vec<DisasmInstr>,
    /// Rendered header (the function label on the entry block).
    pub header_text: InstructionText,
}

impl BasicBlock {
    fn new(entry: u64) -> Self {
        BasicBlock {
            entry,
            ..BasicBlock::default()
        }
    }

    // Decode instructions linearly from the block entry until something
    // ends the block. `known_instrs` maps every decoded address to its
    // owning block entry.
    fn populate(
        &mut self,
        image: &Image,
        arch: Arch,
        ctx: &RenderContext<'_>,
        known_instrs: &mut HashMap<u64, u64>,
    ) {
        let mut addr = self.entry;
        loop {
            known_instrs.insert(addr, self.entry);

            let mut instr = match DisasmInstr::decode(image, arch, addr) {
                Some(instr) => instr,
                None => break,
            };
            instr.format_text(ctx);
            let valid = instr.is_valid();
            let ending = instr.is_block_ending();
            let conditional = instr.is_conditional_branch();
            let target = instr.target;
            let length = instr.len();
            self.instrs.push(instr);

            if !valid {
                break;
            }

            if ending {
                if conditional {
                    let true_path = target.unwrap_or(0);
                    let false_path = addr + length as u64;
                    self.true_path = Some(true_path);
                    self.false_path = Some(false_path);
                    self.exits.push(true_path);
                    self.exits.push(false_path);
                } else if let Some(target) = target {
                    self.exits.push(target);
                }
                break;
            }

            addr += length as u64;
            if known_instrs.contains_key(&addr) {
                self.exits.push(addr);
                break;
            }
        }
    }

    fn update(&mut self, ctx: &RenderContext<'_>) -> bool {
        let mut changed = false;
        for instr in &mut self.instrs {
            if instr.format_text(ctx) {
                changed = true;
            }
        }
        changed
    }
}

/// A discovered function: a map from block entry address to block.
#[derive(Debug, Clone)]
pub struct Function {
    /// Entry address.
    pub entry: u64,
    /// Display name; `sub_xxxxxxxx` unless a symbol or the user names it.
    pub name: String,
    /// Blocks keyed by entry address.
    pub blocks: BTreeMap<u64, BasicBlock>,
    /// True when the function is a single-instruction PLT trampoline.
    pub plt: bool,
    /// True once analysis of this function has completed.
    pub ready: bool,
    /// Monotonic token the renderer uses to detect stale cached text.
    pub update_id: u64,
}

fn header_text(entry: u64, name: &str) -> InstructionText {
    InstructionText {
        lines: vec![vec![Span {
            text: format!("{name}:"),
            color: TokenColor::Header,
        }]],
        tokens: vec![vec![Token {
            column: 0,
            length: name.len(),
            kind: TokenKind::Ptr(entry),
            text: name.to_string(),
        }]],
    }
}

impl Function {
    /// Create a function with an explicit name, or the `sub_` default.
    pub fn new(entry: u64, name: Option<String>) -> Self {
        Function {
            entry,
            name: name.unwrap_or_else(|| format!("sub_{entry:08x}")),
            blocks: BTreeMap::new(),
            plt: false,
            ready: false,
            update_id: 0,
        }
    }

    /// Discover the function's basic blocks from scratch. Safe to call on
    /// a function that was analyzed before; all block state is rebuilt.
    pub fn find_basic_blocks(
        &mut self,
        image: &Image,
        arch: Arch,
        ctx: &RenderContext<'_>,
        update_id: u64,
    ) {
        self.blocks.clear();
        self.plt = false;
        self.ready = false;
        self.update_id = update_id;

        let mut first = BasicBlock::new(self.entry);
        first.header_text = header_text(self.entry, &self.name);
        let mut queue = vec![first];
        let mut known_instrs: HashMap<u64, u64> = HashMap::new();

        while let Some(mut block) = queue.pop() {
            block.populate(image, arch, ctx, &mut known_instrs);
            let exits = block.exits.clone();
            self.blocks.insert(block.entry, block);

            for edge in exits {
                let already_found =
                    self.blocks.contains_key(&edge) || queue.iter().any(|b| b.entry == edge);
                if already_found {
                    continue;
                }
                if let Some(&owner) = known_instrs.get(&edge) {
                    // The edge lands inside an existing block; split it so
                    // the edge can target a block entry.
                    self.split_block(owner, edge, &mut known_instrs);
                } else {
                    let block = BasicBlock::new(edge);
                    known_instrs.insert(edge, edge);
                    queue.push(block);
                }
            }
        }

        // Rebuild predecessor lists by inverting the exit edges.
        let mut edges = Vec::new();
        for block in self.blocks.values_mut() {
            block.prev.clear();
            for &exit in &block.exits {
                edges.push((block.entry, exit));
            }
        }
        for (from, to) in edges {
            if let Some(block) = self.blocks.get_mut(&to) {
                block.prev.push(from);
            }
        }

        // A single one-instruction block that lands on a PLT slot is a
        // trampoline; give it the imported name.
        if self.blocks.len() == 1 {
            let plt_name = self
                .blocks
                .values()
                .next()
                .filter(|b| b.instrs.len() == 1)
                .and_then(|b| b.instrs[0].plt.clone());
            if let Some(name) = plt_name {
                self.rename(&name);
                self.plt = true;
                image.create_symbol(self.entry, &self.name);
            }
        }
    }

    fn split_block(&mut self, owner: u64, edge: u64, known_instrs: &mut HashMap<u64, u64>) {
        let src = match self.blocks.get_mut(&owner) {
            Some(src) => src,
            None => return,
        };
        let index = match src.instrs.iter().position(|i| i.addr == edge) {
            Some(index) => index,
            None => return,
        };

        let mut tail = BasicBlock::new(edge);
        tail.exits = std::mem::take(&mut src.exits);
        tail.true_path = src.true_path.take();
        tail.false_path = src.false_path.take();
        tail.instrs = src.instrs.split_off(index);
        src.exits = vec![edge];

        for instr in &tail.instrs {
            known_instrs.insert(instr.addr, edge);
        }
        self.blocks.insert(edge, tail);
    }

    /// Call targets inside the image, for the discovery queue.
    pub fn find_calls(&self, image: &Image) -> Vec<u64> {
        self.blocks
            .values()
            .flat_map(|block| &block.instrs)
            .filter(|instr| instr.is_call())
            .filter_map(|instr| instr.target)
            .filter(|&target| target >= image.start() && target < image.end())
            .collect_vec()
    }

    /// Re-render every instruction; returns whether any text changed.
    pub fn update(&mut self, ctx: &RenderContext<'_>) -> bool {
        let mut changed = false;
        for block in self.blocks.values_mut() {
            if block.update(ctx) {
                changed = true;
            }
        }
        changed
    }

    /// Rename the function, updating the entry block header.
    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        let entry = self.entry;
        if let Some(block) = self.blocks.get_mut(&entry) {
            block.header_text = header_text(entry, name);
        }
    }
}
