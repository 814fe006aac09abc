//! Loading into a scratch database and merging it under a shared lock.

use idmain_core::prelude::*;
use std::sync::Arc;
use std::thread;

fn load_props(generator: Arc<SessionUidGenerator>, prefix: &str) -> Main {
    let mut scratch = Main::new(generator);
    let lib = scratch.new_library("props", "//props.blend");
    let chair = scratch
        .alloc_in_lib(Some(lib), IdType::Object, Some("Chair"), AllocFlags::empty())
        .unwrap();
    scratch.id_lib_extern(chair);
    let collection = scratch.new_id(IdType::Collection, &format!("{prefix}Set"));
    scratch
        .get_mut(collection)
        .unwrap()
        .data
        .as_collection_mut()
        .unwrap()
        .objects
        .push(Some(chair));
    scratch
}

#[test]
fn parallel_loads_merge_into_one_database() {
    let generator = Arc::new(SessionUidGenerator::new());
    let shared = Arc::new(SharedMain::new(Main::new(Arc::clone(&generator))));

    let workers: Vec<_> = (0..3)
        .map(|i| {
            let shared = Arc::clone(&shared);
            let generator = Arc::clone(&generator);
            thread::spawn(move || {
                let scratch = load_props(generator, &format!("Room{i}"));
                shared.with(|main| main.merge_from(scratch))
            })
        })
        .collect();
    let reports: Vec<MergeReport> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    // The first merge brings the library and its object, later ones reuse them.
    assert_eq!(reports.iter().map(|r| r.libraries_merged).sum::<usize>(), 2);
    assert_eq!(reports.iter().map(|r| r.duplicates).sum::<usize>(), 2);

    let main = Arc::try_unwrap(shared).unwrap().into_inner();
    assert_eq!(main.count(IdType::Library), 1);
    assert_eq!(main.count(IdType::Object), 1);
    assert_eq!(main.count(IdType::Collection), 3);
    let chair = main.list(IdType::Object)[0];
    assert_eq!(main.get(chair).unwrap().users(), 3);
    for (collection, _) in main.iter_type(IdType::Collection) {
        let objects = &main.get(collection).unwrap().data.as_collection().unwrap().objects;
        assert_eq!(objects, &vec![Some(chair)]);
    }
    assert!(main.namemap_validate());
}

#[test]
fn merge_reports_renamed_local_data() {
    let generator = Arc::new(SessionUidGenerator::new());
    let mut main = Main::new(Arc::clone(&generator));
    main.new_id(IdType::Collection, "Set");
    let scratch = load_props(generator, "");

    let report = idmain_core::merge_into(&mut main, scratch);
    assert_eq!(report.moved, 3);
    assert_eq!(report.renamed, 1);
    assert!(main.find_by_name(IdType::Collection, "Set.001").is_some());
}

#[test]
fn merged_session_uids_stay_unique() {
    let mut main = Main::standalone();
    main.new_id(IdType::Text, "D");
    let mut scratch = Main::standalone();
    scratch.new_id(IdType::Text, "A");
    scratch.new_id(IdType::Text, "B");

    main.merge_from(scratch);
    let uids: Vec<SessionUid> = main
        .iter_type(IdType::Text)
        .map(|(_, block)| block.session_uid())
        .collect();
    let unique: std::collections::HashSet<_> = uids.iter().copied().collect();
    assert_eq!(unique.len(), 3);
    for (handle, block) in main.iter_type(IdType::Text) {
        assert_eq!(main.find_by_uid(block.session_uid()), Some(handle));
    }
}

#[test]
fn merged_blocks_are_sorted_into_their_lists() {
    let generator = Arc::new(SessionUidGenerator::new());
    let mut main = Main::new(Arc::clone(&generator));
    for name in ["b", "d"] {
        main.new_id(IdType::Mesh, name);
    }
    let mut scratch = Main::new(generator);
    let lib = scratch.new_library("props", "//props.blend");
    scratch
        .alloc_in_lib(Some(lib), IdType::Mesh, Some("Aardvark"), AllocFlags::empty())
        .unwrap();
    for name in ["e", "a", "c"] {
        scratch.new_id(IdType::Mesh, name);
    }

    let report = main.merge_from(scratch);
    assert_eq!(report.renamed, 0);
    let listed: Vec<(bool, String)> = main
        .iter_type(IdType::Mesh)
        .map(|(_, block)| (block.is_linked(), block.name().to_string()))
        .collect();
    let expected: Vec<(bool, String)> = [
        (false, "a"),
        (false, "b"),
        (false, "c"),
        (false, "d"),
        (false, "e"),
        (true, "Aardvark"),
    ]
    .into_iter()
    .map(|(linked, name)| (linked, name.to_string()))
    .collect();
    assert_eq!(listed, expected);
}
