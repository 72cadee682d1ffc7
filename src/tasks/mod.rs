pub mod event_pump;
pub mod redraw;
