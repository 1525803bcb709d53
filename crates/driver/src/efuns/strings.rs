//! String efuns. Positions are 1-based throughout, matching the dialect.

use super::{EfunCtx, str_result, want_int, want_str};
use crate::driver::Driver;
use crate::interp::RuntimeError;
use crate::sprintf;
use cinder_core::{Efun, Value};

pub fn dispatch(
    d: &mut Driver,
    _cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    use Efun::*;
    match efun {
        Strlen => {
            let s = want_str(efun, &args, 0)?;
            Ok(Value::Int(s.chars().count() as i64))
        }
        Leftstr => {
            let s = want_str(efun, &args, 0)?;
            let n = want_int(efun, &args, 1)?.max(0) as usize;
            Ok(str_result(s.chars().take(n).collect()))
        }
        Rightstr => {
            let s = want_str(efun, &args, 0)?;
            let n = want_int(efun, &args, 1)?.max(0) as usize;
            let len = s.chars().count();
            Ok(str_result(s.chars().skip(len.saturating_sub(n)).collect()))
        }
        Midstr => {
            let s = want_str(efun, &args, 0)?;
            let start = want_int(efun, &args, 1)?.max(1) as usize;
            let len = want_int(efun, &args, 2)?.max(0) as usize;
            Ok(str_result(s.chars().skip(start - 1).take(len).collect()))
        }
        Subst => {
            // subst(str, start, len, replacement): splice over a 1-based span
            let s = want_str(efun, &args, 0)?;
            let chars: Vec<char> = s.chars().collect();
            let total = chars.len() as i64;
            let mut start = want_int(efun, &args, 1)?;
            let mut len = want_int(efun, &args, 2)?;
            let repl = want_str(efun, &args, 3)?;
            start = start.clamp(1, total + 1);
            len = len.max(0).min(total - start + 1);
            let mut out: String = chars[..(start - 1) as usize].iter().collect();
            out.push_str(&repl);
            out.extend(&chars[(start - 1 + len) as usize..]);
            Ok(str_result(out))
        }
        InStr => {
            let s = want_str(efun, &args, 0)?;
            let start = want_int(efun, &args, 1)?.max(1) as usize;
            let pat = want_str(efun, &args, 2)?;
            let chars: Vec<char> = s.chars().collect();
            let pat: Vec<char> = pat.chars().collect();
            if chars.is_empty() || start > chars.len() || pat.len() > chars.len() {
                return Ok(Value::Int(0));
            }
            let upper = chars.len() - pat.len();
            for at in (start - 1)..=upper {
                if chars[at..at + pat.len()] == pat[..] {
                    return Ok(Value::Int(at as i64 + 1));
                }
            }
            Ok(Value::Int(0))
        }
        Upcase => {
            let s = want_str(efun, &args, 0)?;
            Ok(str_result(s.to_uppercase()))
        }
        Downcase => {
            let s = want_str(efun, &args, 0)?;
            Ok(str_result(s.to_lowercase()))
        }
        Atoi => {
            let s = want_str(efun, &args, 0)?;
            let t = s.trim_start();
            let (sign, digits) = match t.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, t.strip_prefix('+').unwrap_or(t)),
            };
            let num: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
            Ok(Value::Int(num.parse::<i64>().unwrap_or(0) * sign))
        }
        Itoa => {
            let n = want_int(efun, &args, 0)?;
            Ok(Value::str(n.to_string()))
        }
        Otoa => match args.first() {
            Some(Value::Object(r)) => Ok(str_result(d.object_name(*r).unwrap_or_default())),
            _ => Ok(Value::Int(0)),
        },
        Atoo => {
            let s = want_str(efun, &args, 0)?;
            match d.object_by_name(&s) {
                Some(obj) => Ok(Value::Object(obj)),
                None => Ok(Value::Int(0)),
            }
        }
        Sprintf => Ok(str_result(sprintf::sprintf(d, &args)?)),
        ReplaceString => {
            let s = want_str(efun, &args, 0)?;
            let from = want_str(efun, &args, 1)?;
            let to = want_str(efun, &args, 2)?;
            if from.is_empty() {
                return Ok(str_result(s.as_ref().to_string()));
            }
            Ok(str_result(s.replace(from.as_ref(), to.as_ref())))
        }
        Crypt => {
            let password = want_str(efun, &args, 0)?;
            let salt = match args.get(1) {
                Some(v) => v.as_str_coerced(),
                None => None,
            };
            let salt = salt.filter(|s| !s.is_empty());
            Ok(Value::str(d.crypt.crypt(&password, salt.as_deref())))
        }
        Chr => {
            let n = want_int(efun, &args, 0)?;
            match char::from_u32((n as u32) & 0xff) {
                Some('\0') | None => Ok(Value::Int(0)),
                Some(c) => Ok(Value::str(c.to_string())),
            }
        }
        Asc => {
            let s = want_str(efun, &args, 0)?;
            Ok(Value::Int(s.chars().next().map(|c| c as i64).unwrap_or(0)))
        }
        other => Err(RuntimeError::new(format!(
            "{} routed to the wrong handler",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn run(efun: Efun, args: Vec<Value>) -> Value {
        let mut d = Driver::new(Config::default());
        let cx = EfunCtx {
            this: d.objects.allocate(
                std::rc::Rc::new(cinder_core::Program::new(
                    1,
                    "/t".into(),
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    std::collections::HashMap::from([(1, 0)]),
                    0,
                )),
                false,
                0,
            ),
            player: None,
            caller: None,
        };
        dispatch(&mut d, &cx, efun, args).unwrap()
    }

    #[test]
    fn test_substring_family_one_based() {
        assert_eq!(
            run(Efun::Midstr, vec![Value::str("abcdef"), Value::Int(2), Value::Int(3)]),
            Value::str("bcd")
        );
        assert_eq!(
            run(Efun::Leftstr, vec![Value::str("abcdef"), Value::Int(2)]),
            Value::str("ab")
        );
        assert_eq!(
            run(Efun::Rightstr, vec![Value::str("abcdef"), Value::Int(2)]),
            Value::str("ef")
        );
    }

    #[test]
    fn test_subst_splices() {
        assert_eq!(
            run(
                Efun::Subst,
                vec![
                    Value::str("hello world"),
                    Value::Int(7),
                    Value::Int(5),
                    Value::str("there")
                ]
            ),
            Value::str("hello there")
        );
        // deleting everything collapses to integer 0
        assert_eq!(
            run(
                Efun::Subst,
                vec![Value::str("x"), Value::Int(1), Value::Int(1), Value::Int(0)]
            ),
            Value::Int(0)
        );
    }

    #[test]
    fn test_instr_one_based_with_start() {
        let s = Value::str("one two two");
        assert_eq!(
            run(Efun::InStr, vec![s.clone(), Value::Int(1), Value::str("two")]),
            Value::Int(5)
        );
        assert_eq!(
            run(Efun::InStr, vec![s.clone(), Value::Int(6), Value::str("two")]),
            Value::Int(9)
        );
        assert_eq!(
            run(Efun::InStr, vec![s, Value::Int(1), Value::str("none")]),
            Value::Int(0)
        );
    }

    #[test]
    fn test_atoi_leading_number() {
        assert_eq!(run(Efun::Atoi, vec![Value::str(" -42abc")]), Value::Int(-42));
        assert_eq!(run(Efun::Atoi, vec![Value::str("abc")]), Value::Int(0));
        assert_eq!(run(Efun::Atoi, vec![Value::Int(0)]), Value::Int(0));
    }

    #[test]
    fn test_chr_asc_round_trip() {
        assert_eq!(run(Efun::Chr, vec![Value::Int(65)]), Value::str("A"));
        assert_eq!(run(Efun::Asc, vec![Value::str("A")]), Value::Int(65));
        assert_eq!(run(Efun::Chr, vec![Value::Int(0)]), Value::Int(0));
    }

    #[test]
    fn test_replace_string_all_occurrences() {
        assert_eq!(
            run(
                Efun::ReplaceString,
                vec![Value::str("a-b-c"), Value::str("-"), Value::str("+")]
            ),
            Value::str("a+b+c")
        );
    }
}
