/// Defines the dry-run behavior mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DryRunMode {
    /// Normal operation - probe files, send the Telegram alert and update the state file
    None,

    /// Quick preview - log in and list candidate files without probing Last-Modified
    Quick,

    /// Full simulation - perform the whole scan and print the alert instead of sending it.
    /// The state file is left untouched so the next real run sees the same updates.
    Full,
}

impl DryRunMode {
    /// `--dry-run-full` wins over `--dry-run`; clap already rejects both together.
    pub fn from_flags(quick: bool, full: bool) -> Self {
        if full {
            DryRunMode::Full
        } else if quick {
            DryRunMode::Quick
        } else {
            DryRunMode::None
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DryRunMode::None => "normal run",
            DryRunMode::Quick => "DRY RUN QUICK - candidate files are listed without probing them",
            DryRunMode::Full => "DRY RUN FULL - messages are printed, not sent",
        }
    }

    /// Returns true if this is any dry-run mode (Quick or Full)
    pub fn is_dry_run(&self) -> bool {
        matches!(self, DryRunMode::Quick | DryRunMode::Full)
    }

    /// Returns true if Last-Modified probes should be performed
    pub fn should_probe(&self) -> bool {
        !matches!(self, DryRunMode::Quick)
    }

    /// Returns true if messages should actually be sent to Telegram
    pub fn should_notify(&self) -> bool {
        matches!(self, DryRunMode::None)
    }

    /// Returns true if the state file should be updated
    pub fn should_save_state(&self) -> bool {
        matches!(self, DryRunMode::None)
    }

    pub fn progress_prefix(&self) -> &'static str {
        match self {
            DryRunMode::None => "",
            DryRunMode::Quick => "[DRY RUN - QUICK] ",
            DryRunMode::Full => "[DRY RUN - FULL] ",
        }
    }
}
