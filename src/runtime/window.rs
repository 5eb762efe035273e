//! Window management
//!
//! There is no native window behind a web channel; every operation is a
//! logged no-op and every query answers `false`.

pub fn minimise() {
    tracing::debug!("window_minimise ignored");
}

pub fn maximise() {
    tracing::debug!("window_maximise ignored");
}

pub fn toggle_maximise() {
    tracing::debug!("window_toggle_maximise ignored");
}

pub fn is_maximised() -> bool {
    false
}

pub fn is_fullscreen() -> bool {
    false
}

pub fn set_dark_theme() {
    tracing::debug!("window_set_dark_theme ignored");
}

pub fn set_light_theme() {
    tracing::debug!("window_set_light_theme ignored");
}

pub fn quit() {
    tracing::debug!("quit ignored");
}
