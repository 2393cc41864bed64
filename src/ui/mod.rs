pub mod map_renderer;
