//! End-to-end scenarios over a whole database.

use idmain_core::prelude::*;

fn object_using(main: &mut Main, name: &str, data: IdHandle) -> IdHandle {
    let object = main.new_id(IdType::Object, name);
    main.get_mut(object).unwrap().data.as_object_mut().unwrap().data = Some(data);
    object
}

fn object_data(main: &Main, object: IdHandle) -> Option<IdHandle> {
    main.get(object).unwrap().data.as_object().unwrap().data
}

fn references_to(main: &Main, target: IdHandle) -> usize {
    main.iter_all()
        .map(|(owner, _)| {
            main.links(owner, WalkFlags::INCLUDE_UI)
                .iter()
                .filter(|link| link.target == Some(target))
                .count()
        })
        .sum()
}

#[test]
fn next_free_suffix_follows_existing_names() {
    let mut main = Main::standalone();
    main.new_id(IdType::Mesh, "Cube");
    main.new_id(IdType::Mesh, "Cube.001");

    let suggestion = main.suggest_unique_name(IdType::Mesh, None, "Cube");
    assert_eq!(suggestion.name, "Cube.002");
    assert!(suggestion.collided);

    // A suggestion does not reserve the name.
    let mesh = main.new_id(IdType::Mesh, "Cube");
    assert_eq!(main.get(mesh).unwrap().name(), "Cube.002");
}

#[test]
fn freed_name_is_handed_out_again() {
    let mut main = Main::standalone();
    main.new_id(IdType::Material, "Metal");
    let second = main.new_id(IdType::Material, "Metal");
    main.new_id(IdType::Material, "Metal");
    assert_eq!(main.get(second).unwrap().name(), "Metal.001");

    main.delete(second);
    let again = main.new_id(IdType::Material, "Metal");
    assert_eq!(main.get(again).unwrap().name(), "Metal.001");
}

#[test]
fn unlinking_keeps_never_null_references() {
    let mut main = Main::standalone();
    let mesh = main.new_id(IdType::Mesh, "A");
    let object = object_using(&mut main, "B", mesh);
    main.refcount_recompute(false);

    let mut remapper = IdRemapper::new();
    remapper.add(&main, mesh, None).unwrap();
    main.remap_multiple(&mut remapper, RemapFlags::STORE_NEVER_NULL_USAGE);

    assert_eq!(object_data(&main, object), Some(mesh));
    assert!(remapper.never_null_users().contains(&object));
    assert_eq!(main.get(mesh).unwrap().users(), 1);
}

#[test]
fn batch_delete_takes_shape_keys_along() {
    for cascade in [false, true] {
        let mut main = Main::standalone();
        let mesh = main.new_id(IdType::Mesh, "A");
        let key = main.new_id(IdType::Key, "Key");
        main.get_mut(key).unwrap().data.as_key_mut().unwrap().from = Some(mesh);
        main.get_mut(mesh).unwrap().data.as_mesh_mut().unwrap().key = Some(key);
        let object = object_using(&mut main, "B", mesh);
        main.refcount_recompute(false);

        let options = DeleteOptions {
            cascade_never_null: cascade,
        };
        main.delete_multiple_with(&[mesh], options);

        assert!(main.get(mesh).is_none());
        assert!(main.get(key).is_none());
        if cascade {
            assert!(main.get(object).is_none());
        } else {
            assert_eq!(object_data(&main, object), None);
        }
        assert_eq!(main.count(IdType::Key), 0);
    }
}

#[test]
fn library_used_only_from_another_library_is_its_child() {
    let mut main = Main::standalone();
    let first = main.new_library("first", "//first.blend");
    let second = main.new_library("second", "//second.blend");
    let mesh = main
        .alloc_in_lib(Some(second), IdType::Mesh, Some("Rock"), AllocFlags::empty())
        .unwrap();
    let object = main
        .alloc_in_lib(Some(first), IdType::Object, Some("Rock"), AllocFlags::empty())
        .unwrap();
    main.get_mut(object).unwrap().data.as_object_mut().unwrap().data = Some(mesh);
    main.id_lib_extern(object);

    main.rebuild_hierarchy();
    let library = |h: IdHandle| main.get(h).unwrap().data.as_library().unwrap().clone();
    assert_eq!(library(first).parent, None);
    assert_eq!(library(second).parent, Some(first));
    assert_eq!(library(second).hierarchy_depth, 1);
}

#[test]
fn remap_moves_exactly_the_rewritten_users() {
    let mut main = Main::standalone();
    let old = main.new_id(IdType::Material, "Old");
    let new = main.new_id(IdType::Material, "New");
    let mesh = main.new_id(IdType::Mesh, "Cube");
    main.get_mut(mesh)
        .unwrap()
        .data
        .as_mesh_mut()
        .unwrap()
        .materials
        .extend([Some(old), Some(old), Some(new)]);
    let object = main.new_id(IdType::Object, "Cube");
    main.get_mut(object)
        .unwrap()
        .data
        .as_object_mut()
        .unwrap()
        .materials
        .push(Some(old));
    main.refcount_recompute(false);
    assert_eq!(main.get(old).unwrap().users(), 3);
    assert_eq!(main.get(new).unwrap().users(), 1);

    let status = main.remap(old, Some(new), RemapFlags::empty()).unwrap();
    assert_eq!(status.skipped_direct, 0);
    assert_eq!(references_to(&main, old), 0);
    assert_eq!(main.get(old).unwrap().users(), 0);
    assert_eq!(main.get(new).unwrap().users(), 4);
}

#[test]
fn deletion_leaves_no_dangling_references() {
    let mut main = Main::standalone();
    let image = main.new_id(IdType::Image, "Brick");
    let material = main.new_id(IdType::Material, "Wall");
    main.get_mut(material)
        .unwrap()
        .data
        .as_material_mut()
        .unwrap()
        .images
        .push(Some(image));
    let scene = main.new_id(IdType::Scene, "Scene");
    let camera_data = main.new_id(IdType::Camera, "Camera");
    let camera = object_using(&mut main, "Camera", camera_data);
    main.get_mut(scene).unwrap().data.as_scene_mut().unwrap().camera = Some(camera);
    let screen = main.new_id(IdType::Screen, "Layout");
    main.get_mut(screen)
        .unwrap()
        .data
        .as_screen_mut()
        .unwrap()
        .space_refs
        .push(Some(image));
    main.refcount_recompute(false);

    let freed = main.delete_multiple(&[image, camera]);
    assert_eq!(freed, 2);
    for gone in [image, camera] {
        assert!(!main.contains(gone));
        assert_eq!(references_to(&main, gone), 0);
    }
    assert!(main.get(scene).unwrap().data.as_scene().unwrap().camera.is_none());
    assert_eq!(main.get(camera_data).unwrap().users(), 0);
    assert!(main.namemap_validate());
}

#[test]
fn relations_match_the_references() {
    let mut main = Main::standalone();
    let mesh = main.new_id(IdType::Mesh, "Cube");
    let a = object_using(&mut main, "A", mesh);
    let b = object_using(&mut main, "B", mesh);

    let relations = main.relations_create();
    let mut users: Vec<IdHandle> = relations.users_of(mesh).iter().map(|item| item.id).collect();
    users.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(users, expected);
    assert_eq!(main.count_users(mesh), 2);
}

#[test]
fn renaming_keeps_lists_sorted_and_names_unique() {
    let mut main = Main::standalone();
    let b = main.new_id(IdType::Text, "b");
    let a = main.new_id(IdType::Text, "A");
    let c = main.new_id(IdType::Text, "C");
    assert_eq!(main.list(IdType::Text), &[a, b, c]);

    let result = main.rename(c, "a", IdNewNameMode::RenameExistingNever).unwrap();
    assert_eq!(result.action, IdNewNameAction::RenamedNoCollision);
    let result = main.rename(b, "A", IdNewNameMode::RenameExistingNever).unwrap();
    assert_eq!(result.action, IdNewNameAction::RenamedCollisionAdjusted);
    assert_eq!(main.get(b).unwrap().name(), "A.001");
    assert_eq!(main.list(IdType::Text), &[a, c, b]);
    assert!(main.namemap_validate());
}
