//! The `sprintf`/`sscanf` format language.
//!
//! `sprintf` supports the C-style conversions `%s %d %i %c %o %x %X %%`
//! with width (including `*`), precision (including `.*`), the flags
//! `- 0 + space #` plus the dialect extensions: `|` centering, `@` apply
//! the conversion to each element of an array argument, `=` word-wrap to
//! the width column, `#` multi-column table layout (precision = column
//! count), `$` even-spaced justification, and `%O` pretty-printing any
//! value in the `save_value` grammar. Unknown specifiers are emitted
//! literally; missing arguments print `<?>`.
//!
//! `sscanf` is the traditional command-parsing flavor: `%s` matches
//! minimally up to the next literal run (or everything to the end),
//! whitespace in the format matches any whitespace run, and scanning
//! stops at the first failed match, returning the conversions made.

use crate::driver::Driver;
use crate::interp::RuntimeError;
use crate::serialize;
use cinder_core::Value;

const DEFAULT_WIDTH: usize = 80;

#[derive(Debug, Clone, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    table: bool,
    each: bool,
    center: bool,
    wrap: bool,
    justify: bool,
    /// `None` unset, `Some(None)` dynamic `*`, `Some(Some(n))` fixed.
    width: Option<Option<usize>>,
    precision: Option<Option<usize>>,
    kind: char,
}

/// `args[0]` is the format string (integer 0 counts as empty).
pub fn sprintf(d: &Driver, args: &[Value]) -> Result<String, RuntimeError> {
    let Some(first) = args.first() else {
        return Ok(String::new());
    };
    let format = first
        .as_str_coerced()
        .ok_or_else(|| RuntimeError::new("sprintf: format must be a string"))?;
    let rest = &args[1..];

    let chars: Vec<char> = format.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    let mut arg = 0usize;
    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let Some((mut spec, next)) = parse_spec(&chars, i) else {
            out.push('%');
            i += 1;
            continue;
        };
        let raw: String = chars[i..next].iter().collect();
        i = next;
        if spec.kind == '%' {
            out.push('%');
            continue;
        }
        // dynamic width/precision consume integer arguments first
        let mut width = match spec.width {
            Some(Some(n)) => Some(n),
            Some(None) => {
                let w = rest.get(arg).and_then(Value::as_int).unwrap_or(0);
                arg += 1;
                Some(w.max(0) as usize)
            }
            None => None,
        };
        let precision = match spec.precision {
            Some(Some(n)) => Some(n),
            Some(None) => {
                let p = rest.get(arg).and_then(Value::as_int).unwrap_or(0);
                arg += 1;
                Some(p.max(0) as usize)
            }
            None => None,
        };
        if !"sdiocxXO".contains(spec.kind) {
            // unknown conversion: emit the specifier literally
            out.push_str(&raw);
            continue;
        }
        let Some(value) = rest.get(arg) else {
            out.push_str("<?>");
            continue;
        };
        arg += 1;
        spec.width = width.take().map(Some);
        spec.precision = precision.map(Some);
        if spec.each {
            match value {
                Value::Array(a) => {
                    let elems = a.borrow().elems.clone();
                    for elem in &elems {
                        format_one(d, &mut out, &spec, elem)?;
                    }
                }
                _ => out.push_str("<not array>"),
            }
        } else {
            format_one(d, &mut out, &spec, value)?;
        }
    }
    Ok(out)
}

fn parse_spec(chars: &[char], start: usize) -> Option<(Spec, usize)> {
    let mut spec = Spec::default();
    let mut i = start + 1;
    loop {
        match chars.get(i)? {
            '-' => spec.left = true,
            '0' => spec.zero = true,
            '+' => spec.plus = true,
            ' ' => spec.space = true,
            '#' => spec.table = true,
            '@' => spec.each = true,
            '|' => spec.center = true,
            '=' => spec.wrap = true,
            '$' => spec.justify = true,
            _ => break,
        }
        i += 1;
    }
    match chars.get(i)? {
        '*' => {
            spec.width = Some(None);
            i += 1;
        }
        c if c.is_ascii_digit() => {
            let mut w = 0usize;
            while let Some(c) = chars.get(i).filter(|c| c.is_ascii_digit()) {
                w = w * 10 + (*c as usize - '0' as usize);
                i += 1;
            }
            spec.width = Some(Some(w));
        }
        _ => {}
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        match chars.get(i) {
            Some('*') => {
                spec.precision = Some(None);
                i += 1;
            }
            Some(c) if c.is_ascii_digit() => {
                let mut p = 0usize;
                while let Some(c) = chars.get(i).filter(|c| c.is_ascii_digit()) {
                    p = p * 10 + (*c as usize - '0' as usize);
                    i += 1;
                }
                spec.precision = Some(Some(p));
            }
            _ => spec.precision = Some(Some(0)),
        }
    }
    spec.kind = *chars.get(i)?;
    Some((spec, i + 1))
}

fn format_one(
    d: &Driver,
    out: &mut String,
    spec: &Spec,
    value: &Value,
) -> Result<(), RuntimeError> {
    match spec.kind {
        's' => {
            let text = match value {
                Value::Str(s) => s.as_ref().to_string(),
                Value::Int(n) if *n == 0 => String::new(),
                Value::Int(n) => n.to_string(),
                _ => "<?>".to_string(),
            };
            if spec.wrap {
                word_wrap(out, &text, spec.fixed_width().unwrap_or(DEFAULT_WIDTH));
            } else if spec.table {
                table(
                    out,
                    &text,
                    spec.fixed_width().unwrap_or(DEFAULT_WIDTH),
                    spec.fixed_precision().filter(|p| *p > 0).unwrap_or(2),
                );
            } else if spec.justify {
                justify(out, &text, spec.fixed_width().unwrap_or(DEFAULT_WIDTH));
            } else {
                pad(out, &text, spec, false);
            }
        }
        'd' | 'i' => integer(out, value.as_int().unwrap_or(0), 10, false, spec),
        'o' => integer(out, value.as_int().unwrap_or(0), 8, false, spec),
        'x' => integer(out, value.as_int().unwrap_or(0), 16, false, spec),
        'X' => integer(out, value.as_int().unwrap_or(0), 16, true, spec),
        'c' => {
            let n = value.as_int().unwrap_or(0);
            let text = char::from_u32((n as u32) & 0xff)
                .map(String::from)
                .unwrap_or_default();
            pad(out, &text, spec, false);
        }
        'O' => {
            let text = match value {
                Value::Object(r) => match d.objects.get(*r) {
                    Some(o) if o.is_prototype => format!("[{}]", o.program.path),
                    Some(o) => format!("{}#{}", o.program.path, o.refno),
                    None => "0".to_string(),
                },
                other => serialize::save_value(d, other)?,
            };
            pad(out, &text, spec, false);
        }
        _ => unreachable!("filtered by caller"),
    }
    Ok(())
}

impl Spec {
    fn fixed_width(&self) -> Option<usize> {
        match self.width {
            Some(Some(n)) if n > 0 => Some(n),
            _ => None,
        }
    }

    fn fixed_precision(&self) -> Option<usize> {
        match self.precision {
            Some(Some(n)) => Some(n),
            _ => None,
        }
    }
}

/// Truncate to precision, then pad to width (left, right, or centered).
fn pad(out: &mut String, text: &str, spec: &Spec, numeric: bool) {
    let mut text: String = match spec.fixed_precision() {
        Some(p) if !numeric => text.chars().take(p).collect(),
        _ => text.to_string(),
    };
    let width = spec.fixed_width().unwrap_or(0);
    let len = text.chars().count();
    if len >= width {
        out.push_str(&text);
        return;
    }
    let fill = if spec.zero && !spec.left { '0' } else { ' ' };
    let pad_len = width - len;
    if spec.center {
        let left = pad_len / 2;
        for _ in 0..left {
            out.push(' ');
        }
        out.push_str(&text);
        for _ in 0..pad_len - left {
            out.push(' ');
        }
    } else if spec.left {
        out.push_str(&text);
        for _ in 0..pad_len {
            out.push(' ');
        }
    } else {
        if fill == '0' && numeric && (text.starts_with('-') || text.starts_with('+')) {
            // keep the sign in front of zero padding
            let sign = text.remove(0);
            out.push(sign);
        }
        for _ in 0..pad_len {
            out.push(fill);
        }
        out.push_str(&text);
    }
}

fn integer(out: &mut String, value: i64, base: u32, upper: bool, spec: &Spec) {
    let negative = value < 0;
    let magnitude = (value as i128).unsigned_abs();
    let mut digits = String::new();
    let mut rem = magnitude;
    if rem == 0 {
        digits.push('0');
    }
    while rem > 0 {
        let digit = (rem % base as u128) as u32;
        let c = char::from_digit(digit, base).unwrap();
        digits.push(if upper { c.to_ascii_uppercase() } else { c });
        rem /= base as u128;
    }
    let digits: String = digits.chars().rev().collect();
    let signed = if negative {
        format!("-{digits}")
    } else if spec.plus {
        format!("+{digits}")
    } else if spec.space {
        format!(" {digits}")
    } else {
        digits
    };
    pad(out, &signed, spec, true);
}

/// `%=s`: wrap words at the width column; every emitted line is padded to
/// the full width.
fn word_wrap(out: &mut String, text: &str, width: usize) {
    let mut line_len = 0usize;
    for word in text.split_whitespace() {
        let wlen = word.chars().count();
        if line_len > 0 && line_len + 1 + wlen > width {
            for _ in line_len..width {
                out.push(' ');
            }
            out.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        out.push_str(word);
        line_len += wlen;
    }
    for _ in line_len..width {
        out.push(' ');
    }
}

/// `%#s`: lay a newline-separated list out in columns, column-major.
fn table(out: &mut String, text: &str, width: usize, columns: usize) {
    let items: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    if items.is_empty() {
        return;
    }
    let col_width = (width / columns).max(1);
    let rows = items.len().div_ceil(columns);
    for row in 0..rows {
        for col in 0..columns {
            let idx = row + col * rows;
            let item = items.get(idx).copied().unwrap_or("");
            let shown: String = item.chars().take(col_width).collect();
            out.push_str(&shown);
            for _ in shown.chars().count()..col_width {
                out.push(' ');
            }
        }
        if row < rows - 1 {
            out.push('\n');
        }
    }
}

/// `%$s`: spread the words so the line is exactly `width` columns.
fn justify(out: &mut String, text: &str, width: usize) {
    let words: Vec<&str> = text.split_whitespace().collect();
    match words.len() {
        0 => {}
        1 => {
            out.push_str(words[0]);
            for _ in words[0].chars().count()..width {
                out.push(' ');
            }
        }
        n => {
            let text_len: usize = words.iter().map(|w| w.chars().count()).sum();
            let gaps = n - 1;
            let total = width.saturating_sub(text_len);
            let per_gap = total / gaps;
            let extra = total % gaps;
            for (i, word) in words.iter().enumerate() {
                out.push_str(word);
                if i < gaps {
                    let spaces = per_gap + usize::from(i < extra);
                    for _ in 0..spaces {
                        out.push(' ');
                    }
                }
            }
        }
    }
}

// ---- sscanf ----

/// Run `format` against `input`, returning the converted values in
/// order. The caller assigns them through its output l-values; fewer
/// results than outputs means the scan stopped early.
pub fn sscanf(input: &str, format: &str) -> Vec<Value> {
    let inp: Vec<char> = input.chars().collect();
    let fmt: Vec<char> = format.chars().collect();
    let mut values = Vec::new();
    let mut i = 0usize; // input position
    let mut f = 0usize; // format position

    while f < fmt.len() {
        let c = fmt[f];
        if c == '%' {
            f += 1;
            let skip = fmt.get(f) == Some(&'*');
            if skip {
                f += 1;
            }
            match fmt.get(f) {
                Some('%') => {
                    f += 1;
                    if inp.get(i) == Some(&'%') {
                        i += 1;
                    } else {
                        break;
                    }
                }
                Some('d') => {
                    f += 1;
                    match scan_int(&inp, i, 10) {
                        Some((v, next)) => {
                            i = next;
                            if !skip {
                                values.push(Value::Int(v));
                            }
                        }
                        None => break,
                    }
                }
                Some('x') => {
                    f += 1;
                    match scan_hex(&inp, i) {
                        Some((v, next)) => {
                            i = next;
                            if !skip {
                                values.push(Value::Int(v));
                            }
                        }
                        None => break,
                    }
                }
                Some('s') => {
                    f += 1;
                    // the literal run after %s bounds the match; no run
                    // means %s takes the rest of the input
                    let lit_end = fmt[f..]
                        .iter()
                        .position(|c| *c == '%')
                        .map(|p| f + p)
                        .unwrap_or(fmt.len());
                    let literal: Vec<char> = fmt[f..lit_end].to_vec();
                    if literal.is_empty() {
                        let text: String = inp[i..].iter().collect();
                        if !skip {
                            values.push(Value::str(text));
                        }
                        i = inp.len();
                        continue;
                    }
                    match find_literal(&inp, i, &literal) {
                        Some((at, consumed)) => {
                            let text: String = inp[i..at].iter().collect();
                            if !skip {
                                values.push(Value::str(text));
                            }
                            i = at + consumed;
                            f = lit_end;
                        }
                        None => {
                            // bounding literal absent: capture the rest
                            // and stop at the failed literal
                            let text: String = inp[i..].iter().collect();
                            if !skip {
                                values.push(Value::str(text));
                            }
                            i = inp.len();
                            break;
                        }
                    }
                }
                _ => break,
            }
        } else if c.is_whitespace() {
            f += 1;
            while inp.get(i).is_some_and(|c| c.is_whitespace()) {
                i += 1;
            }
        } else {
            if inp.get(i) == Some(&c) {
                i += 1;
                f += 1;
            } else {
                break;
            }
        }
    }
    values
}

fn scan_int(inp: &[char], mut i: usize, base: u32) -> Option<(i64, usize)> {
    while inp.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    let negative = match inp.get(i) {
        Some('-') => {
            i += 1;
            true
        }
        Some('+') => {
            i += 1;
            false
        }
        _ => false,
    };
    let start = i;
    let mut value: i64 = 0;
    while let Some(d) = inp.get(i).and_then(|c| c.to_digit(base)) {
        value = value.wrapping_mul(base as i64).wrapping_add(d as i64);
        i += 1;
    }
    if i == start {
        return None;
    }
    Some((if negative { -value } else { value }, i))
}

fn scan_hex(inp: &[char], mut i: usize) -> Option<(i64, usize)> {
    while inp.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    if inp.get(i) == Some(&'0') && matches!(inp.get(i + 1), Some('x') | Some('X')) {
        i += 2;
    }
    let start = i;
    let mut value: i64 = 0;
    while let Some(d) = inp.get(i).and_then(|c| c.to_digit(16)) {
        value = value.wrapping_mul(16).wrapping_add(d as i64);
        i += 1;
    }
    if i == start {
        return None;
    }
    Some((value, i))
}

/// Find the earliest position where the literal run matches, with a
/// whitespace character in the format matching any whitespace run.
/// Returns (match position, input chars consumed by the literal).
fn find_literal(inp: &[char], from: usize, literal: &[char]) -> Option<(usize, usize)> {
    for at in from..=inp.len() {
        if let Some(consumed) = match_literal(inp, at, literal) {
            return Some((at, consumed));
        }
    }
    None
}

fn match_literal(inp: &[char], at: usize, literal: &[char]) -> Option<usize> {
    let mut i = at;
    for &c in literal {
        if c.is_whitespace() {
            while inp.get(i).is_some_and(|x| x.is_whitespace()) {
                i += 1;
            }
        } else if inp.get(i) == Some(&c) {
            i += 1;
        } else {
            return None;
        }
    }
    Some(i - at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use cinder_core::heap::array_from_elems;

    fn fmt(args: Vec<Value>) -> String {
        let d = Driver::new(Config::default());
        sprintf(&d, &args).unwrap()
    }

    #[test]
    fn test_basic_conversions() {
        let s = fmt(vec![
            Value::str("%s has %d gold (%x hex, %o octal, %X HEX)"),
            Value::str("bob"),
            Value::Int(255),
            Value::Int(255),
            Value::Int(8),
            Value::Int(255),
        ]);
        assert_eq!(s, "bob has 255 gold (ff hex, 10 octal, FF HEX)");
    }

    #[test]
    fn test_width_precision_flags() {
        assert_eq!(fmt(vec![Value::str("[%5d]"), Value::Int(42)]), "[   42]");
        assert_eq!(fmt(vec![Value::str("[%-5d]"), Value::Int(42)]), "[42   ]");
        assert_eq!(fmt(vec![Value::str("[%05d]"), Value::Int(-42)]), "[-0042]");
        assert_eq!(fmt(vec![Value::str("[%+d]"), Value::Int(42)]), "[+42]");
        assert_eq!(
            fmt(vec![Value::str("[%.3s]"), Value::str("abcdef")]),
            "[abc]"
        );
        assert_eq!(
            fmt(vec![Value::str("[%|7s]"), Value::str("mid")]),
            "[  mid  ]"
        );
    }

    #[test]
    fn test_dynamic_width() {
        assert_eq!(
            fmt(vec![Value::str("[%*d]"), Value::Int(6), Value::Int(7)]),
            "[     7]"
        );
        assert_eq!(
            fmt(vec![
                Value::str("[%.*s]"),
                Value::Int(2),
                Value::str("abcdef")
            ]),
            "[ab]"
        );
    }

    #[test]
    fn test_too_few_args_and_unknown_spec() {
        assert_eq!(fmt(vec![Value::str("%s and %d")]), "<?> and <?>");
        assert_eq!(fmt(vec![Value::str("100%% sure")]), "100% sure");
        assert_eq!(fmt(vec![Value::str("%q"), Value::Int(1)]), "%q");
    }

    #[test]
    fn test_zero_is_empty_string() {
        assert_eq!(
            fmt(vec![Value::str("(%s)"), Value::Int(0)]),
            "()"
        );
    }

    #[test]
    fn test_array_iteration() {
        let arr = array_from_elems(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(
            fmt(vec![Value::str("%@3d"), Value::Array(arr)]),
            "  1  2  3"
        );
        assert_eq!(
            fmt(vec![Value::str("%@d"), Value::Int(5)]),
            "<not array>"
        );
    }

    #[test]
    fn test_word_wrap_pads_to_column() {
        let s = fmt(vec![
            Value::str("%=10s"),
            Value::str("alpha beta gamma"),
        ]);
        let lines: Vec<&str> = s.split('\n').collect();
        assert!(lines.len() >= 2);
        for line in &lines {
            assert_eq!(line.chars().count(), 10, "line {line:?} not padded");
        }
        assert!(lines[0].starts_with("alpha"));
    }

    #[test]
    fn test_table_layout_column_major() {
        let s = fmt(vec![
            Value::str("%#20.2s"),
            Value::str("a\nb\nc\nd"),
        ]);
        let lines: Vec<&str> = s.split('\n').collect();
        assert_eq!(lines.len(), 2);
        // column-major: first column a,b; second column c,d
        assert!(lines[0].starts_with('a'));
        assert!(lines[0].contains('c'));
        assert!(lines[1].starts_with('b'));
        assert!(lines[1].contains('d'));
    }

    #[test]
    fn test_justify_exact_width() {
        let s = fmt(vec![Value::str("%$11s"), Value::str("a b c")]);
        assert_eq!(s.chars().count(), 11);
        assert!(s.starts_with('a') && s.ends_with('c'));
    }

    #[test]
    fn test_pretty_print_values() {
        let arr = array_from_elems(vec![Value::Int(1), Value::str("x")]);
        assert_eq!(
            fmt(vec![Value::str("%O"), Value::Array(arr)]),
            "({1,\"x\"})"
        );
    }

    #[test]
    fn test_sscanf_command_style() {
        let vals = sscanf("give sword to bob", "give %s to %s");
        assert_eq!(vals, vec![Value::str("sword"), Value::str("bob")]);
    }

    #[test]
    fn test_sscanf_partial_match() {
        let vals = sscanf("give sword", "give %s to %s");
        assert_eq!(vals, vec![Value::str("sword")]);
    }

    #[test]
    fn test_sscanf_last_s_takes_rest() {
        let vals = sscanf("say hello world", "%s %s");
        assert_eq!(vals, vec![Value::str("say"), Value::str("hello world")]);
    }

    #[test]
    fn test_sscanf_whitespace_runs() {
        let vals = sscanf("  ", "%s %s");
        assert_eq!(vals, vec![Value::str(""), Value::str("")]);
    }

    #[test]
    fn test_sscanf_numbers() {
        assert_eq!(
            sscanf("lvl 42 hp -7", "lvl %d hp %d"),
            vec![Value::Int(42), Value::Int(-7)]
        );
        assert_eq!(sscanf("addr 0x1F", "addr %x"), vec![Value::Int(31)]);
        assert_eq!(sscanf("addr 1f", "addr %x"), vec![Value::Int(31)]);
        // %*d converts without storing
        assert_eq!(sscanf("10 20", "%*d %d"), vec![Value::Int(20)]);
        // failed conversion stops the scan
        assert_eq!(sscanf("abc", "%d"), Vec::<Value>::new());
    }
}
