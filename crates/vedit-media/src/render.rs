//! Composition to FFmpeg filter graph.
//!
//! Input 0 is the base source. Its segments are cut with `trim`/`atrim`,
//! concatenated, scaled to the output frame size and resampled to the
//! output rate. Text layers are chained `drawtext` filters reading their
//! text from files; image layers are looped inputs composited with
//! `overlay`; background tracks are delayed, attenuated and mixed with
//! `amix` under the base audio.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::command::{FfmpegCommand, FfmpegInput};
use crate::composition::{Composition, LayerKind, OverlayLayer, TextLayer};

/// Everything needed to run one render.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub command: FfmpegCommand,
    /// `(path, contents)` for each text file referenced by the graph
    pub text_files: Vec<(PathBuf, String)>,
}

/// Build the FFmpeg invocation for `composition`.
///
/// Text files are placed next to `output` as `<stem>_text_<n>.txt`.
pub fn plan_render(composition: &Composition, output: &Path, fps: u32) -> RenderPlan {
    let base = &composition.base;
    let size = composition.frame_size();
    let with_audio = base.has_audio();

    let mut graph: Vec<String> = Vec::new();
    let mut cmd = FfmpegCommand::new(output).input(FfmpegInput::new(&base.source));
    let mut next_input = 1usize;

    // Base timeline.
    let mut concat_inputs = String::new();
    for (i, seg) in base.segments.iter().enumerate() {
        graph.push(format!(
            "[0:v]trim=start={:.6}:end={:.6},setpts=PTS-STARTPTS[v{i}]",
            seg.start, seg.end
        ));
        let _ = write!(concat_inputs, "[v{i}]");
        if with_audio {
            graph.push(format!(
                "[0:a]atrim=start={:.6}:end={:.6},asetpts=PTS-STARTPTS[a{i}]",
                seg.start, seg.end
            ));
            let _ = write!(concat_inputs, "[a{i}]");
        }
    }
    let (concat_outputs, audio_streams) = if with_audio {
        ("[basev][basea]", 1)
    } else {
        ("[basev]", 0)
    };
    graph.push(format!(
        "{}concat=n={}:v=1:a={}{}",
        concat_inputs,
        base.segments.len(),
        audio_streams,
        concat_outputs
    ));
    graph.push(format!(
        "[basev]scale={}:{},setsar=1,fps={}[canvas0]",
        size.width, size.height, fps
    ));

    // Overlays.
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "render".to_string());
    let mut text_files = Vec::new();
    let mut canvas = 0usize;
    for layer in &composition.layers {
        let label_in = format!("[canvas{}]", canvas);
        let label_out = format!("[canvas{}]", canvas + 1);
        match &layer.kind {
            LayerKind::Text(text) => {
                let path = output.with_file_name(format!("{}_text_{}.txt", stem, text_files.len()));
                graph.push(format!(
                    "{}{}{}",
                    label_in,
                    drawtext_filter(text, layer, &path),
                    label_out
                ));
                text_files.push((path, text.text.clone()));
            }
            LayerKind::Image(image) => {
                let input = next_input;
                next_input += 1;
                cmd = cmd.input(FfmpegInput::looped_image(&image.path));
                graph.push(format!(
                    "[{input}:v]scale={}:{},format=rgba,colorchannelmixer=aa={:.3}[img{input}]",
                    image.size.width, image.size.height, image.opacity
                ));
                graph.push(format!(
                    "{}[img{input}]overlay=x={}:y={}:enable='{}'{}",
                    label_in,
                    image.x,
                    image.y,
                    enable_expr(layer),
                    label_out
                ));
            }
        }
        canvas += 1;
    }

    // Audio mix.
    let mut mix_inputs: Vec<String> = Vec::new();
    if with_audio {
        mix_inputs.push("[basea]".to_string());
    }
    for track in &composition.background_audio {
        let input = next_input;
        next_input += 1;
        cmd = cmd.input(FfmpegInput::new(&track.path));
        let delay_ms = (track.timeline_offset * 1000.0).round() as u64;
        graph.push(format!(
            "[{input}:a]atrim=start={:.6}:duration={:.6},asetpts=PTS-STARTPTS,volume={:.3},adelay={}:all=1[bg{input}]",
            track.source_start, track.duration, track.volume, delay_ms
        ));
        mix_inputs.push(format!("[bg{input}]"));
    }
    let audio_label = match mix_inputs.len() {
        0 => None,
        1 => Some(mix_inputs.remove(0)),
        n => {
            graph.push(format!(
                "{}amix=inputs={}:duration=longest:normalize=0[aout]",
                mix_inputs.concat(),
                n
            ));
            Some("[aout]".to_string())
        }
    };

    cmd = cmd
        .filter_complex(graph.join(";"))
        .map(format!("[canvas{}]", canvas));
    cmd = match audio_label {
        Some(label) => cmd.map(label).audio_codec("aac").output_args(["-b:a", "128k"]),
        None => cmd.output_arg("-an"),
    };
    let command = cmd
        .video_codec("libx264")
        .output_args(["-preset", "veryfast", "-crf", "20", "-pix_fmt", "yuv420p"])
        .frame_rate(fps)
        .duration(composition.duration())
        .output_args(["-movflags", "+faststart"]);

    RenderPlan {
        command,
        text_files,
    }
}

fn drawtext_filter(text: &TextLayer, layer: &OverlayLayer, text_file: &Path) -> String {
    let mut filter = format!(
        "drawtext=textfile='{}':expansion=none:fontsize={}:fontcolor={}:x={}:y={}",
        escape_filter_path(text_file),
        text.fontsize,
        sanitize_color(&text.font_color),
        text.x,
        text.y
    );
    if let Some(background) = &text.background_color {
        let _ = write!(
            filter,
            ":box=1:boxborderw=4:boxcolor={}",
            sanitize_color(background)
        );
    }
    if let Some(alpha) = alpha_expr(text, layer) {
        let _ = write!(filter, ":alpha='{}'", alpha);
    }
    let _ = write!(filter, ":enable='{}'", enable_expr(layer));
    filter
}

fn enable_expr(layer: &OverlayLayer) -> String {
    format!(
        "between(t,{:.6},{:.6})",
        layer.span.start, layer.span.end
    )
}

/// Combined fade-in and fixed opacity, or `None` for a fully opaque layer.
fn alpha_expr(text: &TextLayer, layer: &OverlayLayer) -> Option<String> {
    let opacity = text.opacity.unwrap_or(1.0);
    match text.fade_in {
        Some(fade) if fade > 0.0 => Some(format!(
            "{:.3}*min(1,max(0,(t-{:.6})/{:.6}))",
            opacity, layer.span.start, fade
        )),
        _ if text.opacity.is_some() => Some(format!("{:.3}", opacity)),
        _ => None,
    }
}

/// Escape a path for use inside a single-quoted filter option value.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "'\\''")
}

/// Strip anything from a colour that could break out of the option.
fn sanitize_color(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '.' | '_'))
        .collect()
}
