use colored::Colorize;
use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

const REDRAW_INTERVAL: Duration = Duration::from_millis(150);

/// Single line byte progress written to stderr.
pub struct Progress {
    label: String,
    total_size: Option<u64>,
    last_draw_time: Option<Instant>,
    last_stat_time: Instant,
    last_stat_bytes: u64,
    speed: f64,
}

impl Progress {
    pub fn new(label: &str, total_size: Option<u64>) -> Self {
        let mut handle = io::stderr().lock();
        let _ = write!(handle, "\x1B[?25l");
        let _ = handle.flush();

        Self {
            label: label.to_owned(),
            total_size: total_size.filter(|x| *x > 0),
            last_draw_time: None,
            last_stat_time: Instant::now(),
            last_stat_bytes: 0,
            speed: 0.0,
        }
    }

    pub fn update(&mut self, current_bytes: u64) {
        let now = Instant::now();

        if self
            .last_draw_time
            .is_some_and(|x| now.duration_since(x) < REDRAW_INTERVAL)
            && Some(current_bytes) != self.total_size
        {
            return;
        }

        let elapsed_secs = now.duration_since(self.last_stat_time).as_secs_f64();

        if elapsed_secs > 0.0 {
            self.speed = current_bytes.saturating_sub(self.last_stat_bytes) as f64 / elapsed_secs;
        }

        let speed = format!("{}/s", human_bytes(self.speed as u64)).green();
        let line = match self.total_size {
            Some(total_size) => {
                let remaining_secs = if self.speed > 0.0 {
                    (total_size.saturating_sub(current_bytes) as f64 / self.speed) as u64
                } else {
                    0
                };
                let percent = (current_bytes as f64 / total_size as f64 * 100.0).min(100.0) as u64;

                format!(
                    "{} {} / {} {} {} ETA {}",
                    self.label.magenta(),
                    human_bytes(current_bytes),
                    human_bytes(total_size),
                    format!("({}%)", percent).cyan(),
                    speed,
                    clock(remaining_secs).yellow(),
                )
            }
            None => format!(
                "{} {} {}",
                self.label.magenta(),
                human_bytes(current_bytes),
                speed
            ),
        };

        let mut handle = io::stderr().lock();
        let _ = write!(handle, "\r\x1B[2K{}", line); // \x1B[2K clears the line
        let _ = handle.flush();

        self.last_draw_time = Some(now);
        self.last_stat_time = now;
        self.last_stat_bytes = current_bytes;
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        let mut handle = io::stderr().lock();
        let _ = writeln!(handle, "\x1B[?25h");
        let _ = handle.flush();
    }
}

/// Binary units with one decimal, `1536` is `1.5 KiB`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

/// `mm:ss`, or `h:mm:ss` past one hour.
fn clock(secs: u64) -> String {
    let (hours, minutes, secs) = (secs / 3600, secs / 60 % 60, secs % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
