pub mod detail;
pub mod footer;
pub mod header;
pub mod log_overlay;
pub mod render;
pub mod runs;

const BRAILLE_FRAMES: [char; crate::app::SPINNER_FRAME_COUNT] =
    ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

pub fn spinner_frame(idx: usize) -> char {
    BRAILLE_FRAMES[idx % BRAILLE_FRAMES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_wraps_without_panicking() {
        assert_eq!(spinner_frame(0), spinner_frame(BRAILLE_FRAMES.len()));
        let _ = spinner_frame(usize::MAX);
    }
}
