use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    SuccessAfterRetry,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub name: String,
    pub status: Status,
    pub detail: String,
}

/// Append-only record of every entry's outcome, in input order.
#[derive(Debug, Default)]
pub struct RunSummary {
    outcomes: Vec<RunOutcome>,
    pub malformed_lines: usize,
    pub overwritten_files: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: RunOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[RunOutcome] {
        &self.outcomes
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, status: Status) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes().iter().filter(|o| o.status == Status::Failure)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// 0 when every entry succeeded, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        u8::from(self.has_failures())
    }

    pub fn print(&self) {
        print!("{}", self);
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Done: {} processed ({} ok, {} ok after retry, {} failed).",
            self.processed(),
            self.count(Status::Success),
            self.count(Status::SuccessAfterRetry),
            self.count(Status::Failure),
        )?;
        if self.malformed_lines > 0 {
            writeln!(f, "Skipped {} malformed input line(s).", self.malformed_lines)?;
        }
        if self.overwritten_files > 0 {
            writeln!(
                f,
                "Overwrote {} file(s) written earlier in this run (names collide after sanitizing).",
                self.overwritten_files
            )?;
        }
        if self.has_failures() {
            writeln!(f, "\n--- Failures ---")?;
            for o in self.failures() {
                writeln!(f, "  {}: {}", o.name, o.detail)?;
            }
        }
        Ok(())
    }
}
