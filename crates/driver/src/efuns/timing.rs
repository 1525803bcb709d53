//! Time and scheduling efuns. `mktime` renders ctime(3)-style text from
//! a unix timestamp without pulling in a calendar crate.

use super::{EfunCtx, opt_obj, str_result, want_int, want_str};
use crate::driver::Driver;
use crate::interp::RuntimeError;
use cinder_core::{Efun, Value};

pub fn dispatch(
    d: &mut Driver,
    cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    use Efun::*;
    match efun {
        Time => Ok(Value::Int(d.now)),
        Mktime => {
            let t = want_int(efun, &args, 0)?;
            Ok(str_result(format_time(t)))
        }
        Alarm => {
            let delay = want_int(efun, &args, 0)?;
            let func = want_str(efun, &args, 1)?;
            d.queue_alarm(cx.this, delay, &func);
            Ok(Value::Int(1))
        }
        RemoveAlarm => {
            let obj = opt_obj(d, &args, 0).unwrap_or(cx.this);
            let func = want_str(efun, &args, 1)?;
            Ok(Value::Int(d.remove_alarm(obj, Some(&func))))
        }
        SetHeartBeat => {
            let interval = want_int(efun, &args, 0)?.max(0);
            if let Some(o) = d.objects.get_mut(cx.this) {
                o.heart_beat_interval = interval;
                o.last_heart_beat = d.now;
            }
            Ok(Value::Int(1))
        }
        other => Err(RuntimeError::new(format!(
            "{} routed to the wrong handler",
            other.name()
        ))),
    }
}

const DAY_NAMES: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `Www Mmm dd hh:mm:ss yyyy`, UTC.
pub fn format_time(t: i64) -> String {
    let days = t.div_euclid(86_400);
    let secs = t.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    let weekday = DAY_NAMES[days.rem_euclid(7) as usize];
    format!(
        "{weekday} {} {day:2} {:02}:{:02}:{:02} {year}",
        MONTH_NAMES[month as usize - 1],
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

/// Days since the unix epoch to (year, month, day), proleptic Gregorian.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch() {
        assert_eq!(format_time(0), "Thu Jan  1 00:00:00 1970");
    }

    #[test]
    fn test_known_timestamps() {
        // 2000-01-01 00:00:00 UTC was a Saturday
        assert_eq!(format_time(946_684_800), "Sat Jan  1 00:00:00 2000");
        // leap-year day: 2020-02-29 12:34:56 UTC
        assert_eq!(format_time(1_582_979_696), "Sat Feb 29 12:34:56 2020");
    }

    #[test]
    fn test_dates_are_monotonic_across_year_end() {
        let dec31 = format_time(1_703_980_800); // 2023-12-31
        let jan1 = format_time(1_704_067_200); // 2024-01-01
        assert!(dec31.contains("2023"));
        assert!(jan1.contains("2024"));
    }
}
