//! Where the poller shows itself: the title counter, the "enable sound"
//! prompt and the list of incoming requests.

use core::fmt::Write as _;
use std::collections::VecDeque;
use std::io::{self, IsTerminal as _, Write as _};
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ajax::PendingRequest;

pub trait Surface {
    fn set_title(&self, title: &str);
    fn prepend_requests(&self, rows: &[PendingRequest]);
    fn sound_prompt(&self, visible: bool);
}

pub type DynSurface = dyn Surface + Send + Sync;

/// Renders `"(N) <title>"` while there are unseen alerts.
#[derive(Debug, Clone)]
pub struct TitleCounter {
    original: String,
}

impl TitleCounter {
    pub fn new(original: &str) -> Self {
        Self {
            original: original.to_owned(),
        }
    }

    pub fn render(&self, count: u32) -> String {
        if count > 0 {
            format!("({count}) {}", self.original)
        } else {
            self.original.clone()
        }
    }
}

/// Newest-first view of request rows. A row is shown once.
#[derive(Debug)]
pub struct RequestList {
    rows: VecDeque<PendingRequest>,
    capacity: usize,
}

impl RequestList {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Puts `rows` in front, keeping their order. Returns the rows that were
    /// not on display yet.
    pub fn prepend(&mut self, rows: &[PendingRequest]) -> Vec<PendingRequest> {
        let mut fresh: Vec<PendingRequest> = Vec::new();

        for row in rows {
            let shown = self.rows.iter().chain(&fresh).any(|r| r.id == row.id);
            if !shown {
                fresh.push(row.clone());
            }
        }

        for row in fresh.iter().rev() {
            self.rows.push_front(row.clone());
        }
        self.rows.truncate(self.capacity);

        fresh
    }
}

pub fn describe(row: &PendingRequest) -> String {
    let mut line = format!("#{}", row.id);

    if let Some(ref name) = row.patient_name {
        let _ = write!(line, " {name}");
        if let Some(ref dob) = row.patient_dob {
            let _ = write!(line, " ({dob})");
        }
    }
    if let Some(ref doctor) = row.doctor_name {
        let _ = write!(line, ", Dr. {doctor}");
    }
    if let Some(order) = row.order_id {
        let _ = write!(line, ", order #{order}");
    }
    if !row.created_at.is_empty() {
        let _ = write!(line, " at {}", row.created_at);
    }

    line
}

/// Terminal rendition: OSC window title, log lines for rows and the prompt.
pub struct TerminalSurface {
    list: Mutex<RequestList>,
    prompt_visible: AtomicBool,
    osc_title: bool,
}

impl TerminalSurface {
    pub fn new(capacity: usize) -> Self {
        Self {
            list: Mutex::new(RequestList::new(capacity)),
            prompt_visible: AtomicBool::new(false),
            osc_title: io::stdout().is_terminal(),
        }
    }
}

impl Surface for TerminalSurface {
    fn set_title(&self, title: &str) {
        log::debug!("Title: {title}");

        if self.osc_title {
            let mut stdout = io::stdout().lock();
            let _ = write!(stdout, "\x1b]0;{title}\x07");
            let _ = stdout.flush();
        }
    }

    fn prepend_requests(&self, rows: &[PendingRequest]) {
        let fresh = self
            .list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .prepend(rows);

        for row in &fresh {
            log::info!(">> {}", describe(row));
        }
    }

    fn sound_prompt(&self, visible: bool) {
        if self.prompt_visible.swap(visible, Ordering::SeqCst) == visible {
            return;
        }

        if visible {
            log::warn!("Sound is blocked. Type 'u' and press Enter to enable sound");
        } else {
            log::info!("Sound enabled");
        }
    }
}
