//! Runtime error reporting and tracebacks.
//!
//! Every script error funnels through [`runtime_error`]: it logs the
//! header plus a backtrace over the driver's frame stack, and echoes the
//! same lines to the player when one is attached to the failing call.
//! Two formats exist: the detailed one reads the offending source line
//! for each frame; the compact one is single-line-per-frame for
//! production logs.

use crate::driver::Driver;
use cinder_core::ObjRef;
use tracing::error;

pub fn runtime_error(d: &mut Driver, player: Option<ObjRef>, obj: ObjRef, message: &str) {
    let line = d.call_stack.last().map(|f| f.line).unwrap_or(0);
    let name = d
        .object_name(obj)
        .unwrap_or_else(|| "<destructed>".to_string());
    let mut lines = vec![format!("interp: {name} line #{line}: {message}")];

    if d.config.compact_traceback {
        for frame in d.call_stack.iter().rev().take(d.config.max_trace_depth) {
            let refno = d.objects.get(frame.obj).map(|o| o.refno).unwrap_or(-1);
            lines.push(format!(
                "  {}#{}:{} in {}()",
                frame.program_path, refno, frame.line, frame.func
            ));
        }
    } else if !d.call_stack.is_empty() {
        lines.push("Backtrace (most recent call first):".to_string());
        for (depth, frame) in d.call_stack.iter().rev().enumerate() {
            if depth >= d.config.max_trace_depth {
                lines.push(format!(
                    "  ... (trace truncated at {} frames)",
                    d.config.max_trace_depth
                ));
                break;
            }
            let refno = d.objects.get(frame.obj).map(|o| o.refno).unwrap_or(-1);
            lines.push(format!(
                "  [{depth}] {}#{}:{} in {}()",
                frame.program_path, refno, frame.line, frame.func
            ));
            if let Some(text) = source_line(d, &frame.program_path, frame.line) {
                lines.push(format!("      Line {}: {}", frame.line, text.trim()));
            }
        }
    }

    for l in &lines {
        error!(target: "cinder::interp", "{l}");
    }
    if let Some(player) = player {
        let text = lines.join("\n") + "\n";
        d.send_to_object(player, &text);
    }
}

/// Read one line of a script source file, on demand, for tracebacks.
fn source_line(d: &Driver, path: &str, line: u32) -> Option<String> {
    if line == 0 {
        return None;
    }
    let source = d.vfs.read(&format!("{path}.ci")).ok()?;
    source.lines().nth(line as usize - 1).map(str::to_string)
}

/// Compile failures: log the rendered context report and echo it to the
/// triggering player, if any.
pub fn compile_error(d: &mut Driver, player: Option<ObjRef>, err: &cinder_compiler::CompileError) {
    let source = d.vfs.read(&format!("{}.ci", err.path)).unwrap_or_default();
    let report = err.render(&source);
    for l in report.lines() {
        error!(target: "cinder::compile", "{l}");
    }
    if let Some(player) = player {
        let text = report + "\n";
        d.send_to_object(player, &text);
    }
}
