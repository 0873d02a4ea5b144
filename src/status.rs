use std::time::Instant;

//  Runtime          |  Completed  |  Status
// ------------------------------------------
//  00d 00h 00m 03s  |  1000/1960  |  51%
//  00d 00h 00m 13s  |  1960/1960  |  100%
// ------------------------------------------

/// Formats the progress rows of a running search. Runs of fewer than 1 000
/// fits are over before a row is worth printing, and the column layout
/// degenerates, so every method returns an empty string for them.
pub struct StatusLog {
    start: Instant,
    total: u64,
    digits: usize,
}

impl StatusLog {
    pub fn new(total: u64) -> StatusLog {
        StatusLog {
            start: Instant::now(),
            total,
            digits: total.max(1).to_string().len(),
        }
    }

    pub fn header(&self) -> String {
        if self.total < 1000 {
            return String::new();
        }
        format!(
            " Runtime          |  Completed{}  |  Status\n{}",
            " ".repeat(2 * (self.digits - 4)),
            "-".repeat(34 + 2 * self.digits)
        )
    }

    pub fn status(&self, completed: u64) -> String {
        if self.total < 1000 {
            return String::new();
        }
        let elapsed = self.start.elapsed().as_secs();

        // Format into (dd hh mm ss)
        let days = elapsed / 60 / 60 / 24;
        let hours = (elapsed / 60 / 60) % 24;
        let minutes = (elapsed / 60) % 60;
        let seconds = elapsed % 60;

        format!(
            " {:02}d {:02}h {:02}m {:02}s  |  {:>width$}/{}  |  {}%",
            days,
            hours,
            minutes,
            seconds,
            completed,
            self.total,
            100 * completed / self.total,
            width = self.digits
        )
    }

    pub fn footer(&self, completed: u64) -> String {
        if self.total < 1000 {
            return String::new();
        }
        format!(
            "{}\n{}",
            self.status(completed),
            "-".repeat(34 + 2 * self.digits)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_row_is_formatted_and_padded() {
        let log = StatusLog::new(1960);
        // Freshly created, so the elapsed clock still reads zero
        assert_eq!(log.status(1000), " 00d 00h 00m 00s  |  1000/1960  |  51%");
        assert_eq!(log.status(42), " 00d 00h 00m 00s  |    42/1960  |  2%");
    }

    #[test]
    fn header_and_footer_share_the_separator_width() {
        let log = StatusLog::new(123_456);
        let header = log.header();
        let separator = header.lines().nth(1).unwrap();
        assert_eq!(separator.len(), 34 + 2 * 6);
        assert!(log.footer(123_456).ends_with(separator));
    }

    #[test]
    fn tiny_runs_are_silent() {
        let log = StatusLog::new(999);
        assert!(log.header().is_empty());
        assert!(log.status(500).is_empty());
        assert!(log.footer(999).is_empty());
    }
}
