pub mod allocate;
pub mod screen;
