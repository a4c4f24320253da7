use burin_image::{AddressSpace, ByteStore, ModTag};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

#[derive(Debug, Clone)]
enum Edit {
    Write(u8, Vec<u8>),
    Insert(u8, Vec<u8>),
    Remove(u8, u8),
}

impl Arbitrary for Edit {
    fn arbitrary(g: &mut Gen) -> Self {
        let data: Vec<u8> = Vec::arbitrary(g)
            .into_iter()
            .take(8)
            .collect();
        match u8::arbitrary(g) % 3 {
            0 => Edit::Write(u8::arbitrary(g) % 64, data),
            1 => Edit::Insert(u8::arbitrary(g) % 64, data),
            _ => Edit::Remove(u8::arbitrary(g) % 64, u8::arbitrary(g) % 16),
        }
    }
}

fn apply(store: &ByteStore, edits: &[Edit]) {
    for (i, edit) in edits.iter().enumerate() {
        match edit {
            Edit::Write(ofs, data) => {
                store.write_at(*ofs as usize, data);
            }
            Edit::Insert(ofs, data) => {
                store.insert(*ofs as usize, data);
            }
            Edit::Remove(ofs, len) => {
                store.remove(*ofs as usize, *len as usize);
            }
        }
        store.commit_undo(i as u64, i as u64 + 1);
    }
}

fn snapshot(store: &ByteStore) -> (Vec<u8>, Vec<ModTag>) {
    (
        store.read(0, store.len()),
        store.get_modification(0, store.len()),
    )
}

// Applying any edit sequence, undoing it all and redoing it all lands on
// the same bytes and the same per-byte tags.
#[quickcheck]
fn undo_all_redo_all_round_trips(initial: Vec<u8>, edits: Vec<Edit>) -> bool {
    let store = ByteStore::from_bytes(initial.clone());
    apply(&store, &edits);
    let applied = snapshot(&store);

    while store.undo().is_some() {}
    let rolled_back = snapshot(&store);
    if rolled_back.0 != initial {
        return false;
    }
    if rolled_back.1.iter().any(|&t| t != ModTag::Original) {
        return false;
    }

    while store.redo().is_some() {}
    snapshot(&store) == applied
}

#[quickcheck]
fn undo_restores_modified_flag(initial: Vec<u8>, edits: Vec<Edit>) -> bool {
    let store = ByteStore::from_bytes(initial);
    apply(&store, &edits);
    while store.undo().is_some() {}
    !store.is_modified()
}
