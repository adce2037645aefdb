mod helpers;

mod workers {
    mod cluster_group;
    mod process_photo;
}
