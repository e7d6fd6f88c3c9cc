//! The sparse object-file format: runs of contiguous emitted bytes, each
//! announced with an `@ADDR` header and followed by its hex bytes, so gaps
//! left by `SPACE` or an `ORG` jump never appear as literal zero fill.

use std::fmt::Write as _;

use crate::image::Image;

/// Groups `image`'s emitted cells into maximal contiguous runs and renders
/// each as `@XXXX` followed by its bytes, one run per block.
pub fn render(image: &Image) -> String {
    let mut out = String::new();
    let mut run_start: Option<u32> = None;
    let mut run_bytes: Vec<u8> = Vec::new();

    let mut flush = |out: &mut String, run_start: &mut Option<u32>, run_bytes: &mut Vec<u8>| {
        if let Some(start) = run_start.take() {
            let _ = writeln!(out, "@{start:04X}");
            for chunk in run_bytes.chunks(16) {
                let line = chunk.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
                let _ = writeln!(out, "{line}");
            }
            run_bytes.clear();
        }
    };

    let mut expected_next: Option<u32> = None;
    for (addr, byte) in image.iter() {
        if expected_next != Some(addr) {
            flush(&mut out, &mut run_start, &mut run_bytes);
            run_start = Some(addr);
        }
        run_bytes.push(byte);
        expected_next = Some(addr + 1);
    }
    flush(&mut out, &mut run_start, &mut run_bytes);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn contiguous_bytes_form_one_run() {
        let mut image = Image::new();
        let mut loc = 0x1000;
        image.emit(&mut loc, 0xA9).unwrap();
        image.emit(&mut loc, 0x01).unwrap();
        let rendered = render(&image);
        assert_eq!(rendered, "@1000\nA9 01\n");
    }

    #[test]
    fn a_gap_starts_a_new_run() {
        let mut image = Image::new();
        let mut loc = 0;
        image.emit(&mut loc, 0xEA).unwrap();
        let mut loc2 = 0x10;
        image.emit(&mut loc2, 0xEA).unwrap();
        let rendered = render(&image);
        assert_eq!(rendered, "@0000\nEA\n@0010\nEA\n");
    }

    #[test]
    fn empty_image_renders_nothing() {
        let image = Image::new();
        assert_eq!(render(&image), "");
    }

    #[test]
    fn long_runs_wrap_every_sixteen_bytes() {
        let mut image = Image::new();
        let mut loc = 0;
        for i in 0..20u8 {
            image.emit(&mut loc, i).unwrap();
        }
        let rendered = render(&image);
        assert_eq!(rendered.lines().count(), 3); // header + 16-byte line + 4-byte line
    }
}
