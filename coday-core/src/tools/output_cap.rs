/// Last N lines kept by [`cap_output`] (§4.4 step 4).
const MAX_LINES: usize = 200;
/// Byte ceiling kept by [`cap_output`] (§4.4 step 4).
const MAX_BYTES: usize = 64 * 1024;

/// Bound a tool's textual output to the size policy named in the spec: the
/// last 200 lines, capped to 64 KiB, to bound token cost.
pub fn cap_output(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let tail = if lines.len() > MAX_LINES {
        &lines[lines.len() - MAX_LINES..]
    } else {
        &lines[..]
    };
    let mut capped = tail.join("\n");
    if capped.len() > MAX_BYTES {
        let mut cut = MAX_BYTES;
        while cut > 0 && !capped.is_char_boundary(cut) {
            cut -= 1;
        }
        capped.truncate(cut);
    }
    capped
}
