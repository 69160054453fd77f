//! Byte-value histogram as a text bar chart

use std::io::{self, Read, Write};

/// Width of the longest bar, not counting the leading mark
pub const BAR_WIDTH: u64 = 76;

/// Occurrences of every byte value in `input`.
pub fn count_bytes<R: Read + ?Sized>(input: &mut R) -> io::Result<[u64; 256]> {
    let mut counts = [0u64; 256];
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        for byte in &buf[..n] {
            counts[usize::from(*byte)] += 1;
        }
    }
    Ok(counts)
}

/// One line per byte value: `"xx|"`, a `#` if the value occurs at all, then
/// the count scaled so the peak fits in [`BAR_WIDTH`].
pub fn render<W: Write + ?Sized>(counts: &[u64; 256], out: &mut W) -> io::Result<()> {
    let peak = counts.iter().copied().max().unwrap_or(0).max(BAR_WIDTH);
    let scale = peak / BAR_WIDTH;

    for (value, count) in counts.iter().enumerate() {
        let mut bar = if *count > 0 { 1 } else { 0 };
        bar += count / scale;
        writeln!(out, "{:2x}|{}", value, "#".repeat(bar as usize))?;
    }
    Ok(())
}

/// Read all of `input` and print its histogram. Empty input is an error.
pub fn histogram<R, W>(input: &mut R, out: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let counts = count_bytes(input)?;
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "empty input"));
    }
    render(&counts, out)?;
    out.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn lines(input: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        histogram(&mut Cursor::new(input), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn small_counts_are_unscaled() {
        let lines = lines(&[0, 0, 0, 0xab]);
        assert_eq!(lines.len(), 256);
        assert_eq!(lines[0], " 0|####");
        assert_eq!(lines[1], " 1|");
        assert_eq!(lines[0xab], "ab|##");
    }

    #[test]
    fn large_counts_are_scaled_to_bar_width() {
        let mut input = vec![7u8; 760];
        input.extend_from_slice(&[9; 10]);
        let lines = lines(&input);

        // scale is 760 / 76 = 10
        assert_eq!(lines[7], format!(" 7|{}", "#".repeat(77)));
        assert_eq!(lines[9], " 9|##");
    }

    #[test]
    fn rare_values_still_get_a_mark() {
        let mut input = vec![1u8; 1000];
        input.push(2);
        assert_eq!(lines(&input)[2], " 2|#");
    }

    #[test]
    fn empty_input_is_an_error() {
        let mut out = Vec::new();
        let err = histogram(&mut io::empty(), &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(out.is_empty());
    }
}
