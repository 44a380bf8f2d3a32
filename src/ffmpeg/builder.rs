//! FFmpeg argument vectors. Arguments are passed to the child process as discrete
//! entries, never joined into a shell command line.

use std::time::Duration;

/// Seek offset in seconds with millisecond precision, as `-ss` expects.
pub fn format_seek_seconds(offset: Duration) -> String {
    format!("{:.3}", offset.as_secs_f64())
}

/// Arguments for grabbing a single frame at `offset`, scaled to `width` (even height,
/// aspect preserved). The still-image encoder is picked by FFmpeg from `output_path`'s extension.
pub fn build_frame_extract_args(
    input_path: &str,
    output_path: &str,
    offset: Duration,
    width: u32,
) -> Vec<String> {
    let seek = format_seek_seconds(offset);
    log::trace!(
        target: "vidthumb::ffmpeg::builder",
        "Building frame extract command: ss={}, width={}, input={} -> output={}",
        seek,
        width,
        input_path,
        output_path
    );
    vec![
        "-nostdin".to_string(),
        "-hide_banner".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        seek,
        "-i".to_string(),
        input_path.to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        format!("scale={}:-2", width),
        "-update".to_string(),
        "1".to_string(),
        output_path.to_string(),
    ]
}

/// One flag (with its value, if any) per line, for trace logs.
pub fn format_args_for_display_multiline(args: &[String]) -> String {
    if args.is_empty() {
        return String::new();
    }
    let mut lines = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let line = if arg.starts_with('-') && i + 1 < args.len() && !args[i + 1].starts_with('-') {
            let value = &args[i + 1];
            i += 2;
            format!("  {} {}", arg, value)
        } else {
            i += 1;
            format!("  {}", arg)
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let idx = args.iter().position(|a| a == flag).unwrap();
        &args[idx + 1]
    }

    #[test]
    fn seek_has_millisecond_precision() {
        assert_eq!(format_seek_seconds(Duration::from_millis(0)), "0.000");
        assert_eq!(format_seek_seconds(Duration::from_millis(2500)), "2.500");
        assert_eq!(format_seek_seconds(Duration::from_millis(61_007)), "61.007");
    }

    #[test]
    fn extract_args_seek_before_input_and_output_last() {
        let args = build_frame_extract_args("/in.mp4", "/out.jpg", Duration::from_millis(1500), 100);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input, "input seeking keeps extraction fast");
        assert_eq!(value_after(&args, "-ss"), "1.500");
        assert_eq!(value_after(&args, "-i"), "/in.mp4");
        assert_eq!(value_after(&args, "-frames:v"), "1");
        assert_eq!(value_after(&args, "-vf"), "scale=100:-2");
        assert_eq!(args.last().unwrap(), "/out.jpg");
    }

    #[test]
    fn paths_with_spaces_and_quotes_stay_single_arguments() {
        let input = "/tmp/my \"video\" $(rm -rf).mp4";
        let args = build_frame_extract_args(input, "/tmp/out put.png", Duration::ZERO, 64);
        assert!(args.iter().any(|a| a == input));
        assert_eq!(args.last().unwrap(), "/tmp/out put.png");
    }

    #[test]
    fn multiline_display_pairs_flags_with_values() {
        let args: Vec<String> = ["-y", "-ss", "1.000", "-i", "/in.mp4", "/out.jpg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            format_args_for_display_multiline(&args),
            "  -y\n  -ss 1.000\n  -i /in.mp4\n  /out.jpg"
        );
    }
}
