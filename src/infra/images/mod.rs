pub mod fs_image_store;
