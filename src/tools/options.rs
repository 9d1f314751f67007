//! Scanner command line derived from the device's capability listing.
//!
//! `scanimage -A` prints every option the attached backend understands.
//! Options are only passed when the listing mentions them, because
//! `scanimage` rejects unknown options and backends differ widely. Software
//! despeckle and deskew are never enabled: both are too slow for a
//! continuously fed ADF.

use std::path::Path;

/// Maximum page width in millimetres (fully open ADF guides).
const PAGE_WIDTH_MM: &str = "221.121";
/// Maximum page length in millimetres (long-document mode).
const PAGE_HEIGHT_MM: &str = "876.695";

/// Build the `scanimage` arguments for a session.
///
/// Raw pages are written to `batch_dir/out<N>.pnm` and their paths printed on
/// stdout; the scanner prompts for `<RETURN>` before every sheet.
pub fn scanner_options(capabilities: &str, batch_dir: &Path, dpi: u32) -> Vec<String> {
    let has = |needle: &str| capabilities.contains(needle);

    let mut options = vec![
        format!("--batch={}/out%d.pnm", batch_dir.display()),
        "--batch-prompt".to_string(),
        "--batch-print".to_string(),
    ];

    let mut push = |args: &[&str]| options.extend(args.iter().map(|a| a.to_string()));

    if has("--resolution ") {
        push(&[&format!("--resolution={dpi}")]);
    }
    if has("--mode ") {
        push(&["--mode=Color"]);
    }
    if has("--page-width ") {
        push(&[&format!("--page-width={PAGE_WIDTH_MM}")]);
    }
    if has("--page-height ") {
        push(&[&format!("--page-height={PAGE_HEIGHT_MM}")]);
    }
    if has("-l ") {
        push(&["-l", "0"]);
    }
    if has("-t ") {
        push(&["-t", "0"]);
    }
    if has("-x ") {
        push(&["-x", PAGE_WIDTH_MM]);
    }
    if has("-y ") {
        push(&["-y", PAGE_HEIGHT_MM]);
    }
    // Listed as "--ald[=(yes|no)]", hence no trailing space.
    if has("--ald") {
        push(&["--ald=yes"]);
    }
    if has("--overscan ") {
        push(&["--overscan=On"]);
    }
    if has("--prepick ") {
        push(&["--prepick=On"]);
    }
    if has("--source ") && has("ADF Duplex") {
        push(&["--source", "ADF Duplex"]);
    } else {
        // A flatbed would otherwise scan forever.
        push(&["--batch-count=1"]);
    }
    if has("--swcrop") {
        push(&["--swcrop=yes"]);
    }
    if has("--buffermode ") {
        push(&["--buffermode=On"]);
    }
    if has("--sleeptimer ") {
        push(&["--sleeptimer=10"]);
    }
    if has("--brightness ") {
        push(&["--brightness=9"]);
    }
    if has("--contrast ") {
        push(&["--contrast=9"]);
    }

    options
}
