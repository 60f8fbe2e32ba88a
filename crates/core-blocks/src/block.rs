//! Content unit: one independently writable, closable region of output.
//!
//! A `Block` is a cheap handle; clones refer to the same unit. It is created
//! detached, may be registered with exactly one region manager (`Blocks`), and
//! from then on is painted by that manager's repaint worker.
//!
//! Locking: the unit state sits behind its own mutex. The manager always takes
//! its sequence lock before any unit lock, and no unit method calls back into
//! the manager while holding the unit lock, so the two never deadlock.
//!
//! Text written to a block is prefixed per line with a gap: the first line of
//! a fresh buffer gets `gap + content_gap`, every following line gets
//! `followup_gap + content_gap`. A title line (printed with `gap`) shifts all
//! content lines to the follow-up gap.

use crate::blocks::{Blocks, Shared};
use crate::error::{BlocksError, Result};
use crate::lines::LineLayout;
use crate::signal::{Context, Signal};
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::thread;
use tracing::{debug, warn};

/// Window size used when none is given.
pub const DEFAULT_VIEW: usize = 10;

type Closer = Box<dyn FnOnce() + Send + 'static>;

struct BlockState {
    buf: Vec<u8>,
    view: usize,
    title_line: String,
    final_text: Option<Vec<u8>>,
    gap: String,
    followup_gap: String,
    content_gap: String,
    start_line: bool,
    closed: bool,
    hidden: bool,
    hide_on_close: bool,
    auto_flush: bool,
    next: Weak<BlockInner>,
    closers: Vec<Closer>,
    last_painted: usize,
}

pub(crate) struct BlockInner {
    state: Mutex<BlockState>,
    dirty: AtomicBool,
    done: Signal,
    owner: OnceLock<Weak<Shared>>,
}

#[derive(Clone)]
pub struct Block {
    inner: Arc<BlockInner>,
}

impl Default for Block {
    fn default() -> Self {
        Self::new(DEFAULT_VIEW)
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state();
        f.debug_struct("Block")
            .field("view", &st.view)
            .field("len", &st.buf.len())
            .field("closed", &st.closed)
            .field("hidden", &st.hidden)
            .field("assigned", &self.is_assigned())
            .finish()
    }
}

impl BlockState {
    fn invisible(&self) -> bool {
        self.hidden || (self.closed && self.hide_on_close)
    }

    fn push_with_gaps(&mut self, data: &[u8]) {
        let mut first = self.buf.is_empty() && self.title_line.is_empty();
        for &b in data {
            if b == b'\n' {
                self.start_line = true;
                first = false;
            } else {
                if self.start_line {
                    let lead = if first { &self.gap } else { &self.followup_gap };
                    self.buf.extend_from_slice(lead.as_bytes());
                    self.buf.extend_from_slice(self.content_gap.as_bytes());
                }
                self.start_line = false;
            }
            self.buf.push(b);
        }
    }

    /// Append this unit's paint to `frame` and return the terminal lines used.
    fn render(&self, frame: &mut Vec<u8>, width: usize, final_pass: bool) -> usize {
        if self.invisible() {
            return 0;
        }
        let mut title = 0;
        let data: &[u8] = match (&self.final_text, self.closed) {
            (Some(text), true) => text,
            _ => {
                if !self.title_line.is_empty() {
                    frame.extend_from_slice(self.gap.as_bytes());
                    frame.extend_from_slice(self.title_line.as_bytes());
                    frame.push(b'\n');
                    title = 1;
                }
                &self.buf
            }
        };
        if data.is_empty() {
            return title;
        }

        let layout = LineLayout::scan(data, self.view, width);
        let consumed = if final_pass || layout.lines <= self.view {
            frame.extend_from_slice(data);
            layout.total_lines()
        } else {
            frame.extend_from_slice(&data[layout.window_start().start..]);
            layout.window_lines()
        };
        if !layout.ends_on_boundary {
            frame.push(b'\n');
        }
        consumed + title
    }
}

impl Block {
    /// New detached block keeping at most `view` most recent lines visible.
    /// A view of `0` is treated as `1`.
    pub fn new(view: usize) -> Self {
        Self {
            inner: Arc::new(BlockInner {
                state: Mutex::new(BlockState {
                    buf: Vec::new(),
                    view: view.max(1),
                    title_line: String::new(),
                    final_text: None,
                    gap: String::new(),
                    followup_gap: String::new(),
                    content_gap: String::new(),
                    start_line: true,
                    closed: false,
                    hidden: false,
                    hide_on_close: false,
                    auto_flush: false,
                    next: Weak::new(),
                    closers: Vec::new(),
                    last_painted: 0,
                }),
                dirty: AtomicBool::new(true),
                done: Signal::new(),
                owner: OnceLock::new(),
            }),
        }
    }

    pub fn with_default_view() -> Self {
        Self::new(DEFAULT_VIEW)
    }

    /// True when both handles refer to the same unit.
    pub fn same(&self, other: &Block) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn state(&self) -> MutexGuard<'_, BlockState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn owner(&self) -> Option<Arc<Shared>> {
        self.inner.owner.get().and_then(Weak::upgrade)
    }

    pub(crate) fn assign(&self, owner: &Arc<Shared>) -> Result<()> {
        self.inner
            .owner
            .set(Arc::downgrade(owner))
            .map_err(|_| BlocksError::AlreadyAssigned)
    }

    pub fn is_assigned(&self) -> bool {
        self.inner.owner.get().is_some()
    }

    /// The region manager this block is registered with, if it is still alive.
    pub fn blocks(&self) -> Option<Blocks> {
        self.owner().map(Blocks::from_shared)
    }

    pub(crate) fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::Release);
    }

    /// Consume the dirty flag.
    pub(crate) fn take_dirty(&self) -> bool {
        self.inner.dirty.swap(false, Ordering::AcqRel)
    }

    fn request_flush(&self) {
        if let Some(owner) = self.owner() {
            owner.request_flush();
        }
    }

    /// Mutate presentation state; visible on the next paint.
    fn configure(&self, f: impl FnOnce(&mut BlockState)) -> &Self {
        f(&mut self.state());
        self.mark_dirty();
        self.request_flush();
        self
    }

    /// Line printed (with the gap) above the content while the block is open.
    pub fn set_title_line(&self, title: impl Into<String>) -> &Self {
        let title = title.into();
        self.configure(|st| st.title_line = title)
    }

    /// Text replacing the content once the block is closed.
    pub fn set_final(&self, text: impl Into<String>) -> &Self {
        let text = text.into();
        self.configure(|st| st.final_text = Some(text.into_bytes()))
    }

    /// Request a repaint after every write.
    pub fn set_auto(&self, auto: bool) -> &Self {
        self.configure(|st| st.auto_flush = auto)
    }

    /// Prefix of the first line; also becomes the follow-up gap if none is set.
    pub fn set_gap(&self, gap: impl Into<String>) -> &Self {
        let gap = gap.into();
        self.configure(|st| {
            if st.followup_gap.is_empty() {
                st.followup_gap = gap.clone();
            }
            st.gap = gap;
        })
    }

    pub fn set_followup_gap(&self, gap: impl Into<String>) -> &Self {
        let gap = gap.into();
        self.configure(|st| st.followup_gap = gap)
    }

    /// Extra prefix applied to every content line after the line gap.
    pub fn set_content_gap(&self, gap: impl Into<String>) -> &Self {
        let gap = gap.into();
        self.configure(|st| st.content_gap = gap)
    }

    pub fn hide(&self, hidden: bool) -> &Self {
        self.configure(|st| st.hidden = hidden)
    }

    /// Make the block disappear once closed instead of leaving its content.
    pub fn hide_on_close(&self, hide: bool) -> &Self {
        self.configure(|st| st.hide_on_close = hide)
    }

    /// Forward link used by collaborators to thread a sub-sequence. Held
    /// weakly; the engine's own ordering never looks at it.
    pub fn set_next(&self, next: Option<&Block>) {
        let link = next.map_or_else(Weak::new, |b| Arc::downgrade(&b.inner));
        self.state().next = link;
    }

    pub fn next(&self) -> Option<Block> {
        self.state().next.upgrade().map(|inner| Block { inner })
    }

    /// Drop the buffered content. No-op once closed.
    pub fn reset(&self) {
        {
            let mut st = self.state();
            if st.closed {
                return;
            }
            st.buf.clear();
            st.start_line = true;
        }
        self.mark_dirty();
    }

    /// Append `data`, applying line gaps. Fails with `Closed` after `close`.
    pub fn append(&self, data: &[u8]) -> Result<usize> {
        let auto = {
            let mut st = self.state();
            if st.closed {
                return Err(BlocksError::Closed);
            }
            st.push_with_gaps(data);
            st.auto_flush
        };
        self.mark_dirty();
        if auto {
            self.request_flush();
        }
        Ok(data.len())
    }

    fn flush_inner(&self) -> Result<()> {
        let owner = self.owner().ok_or(BlocksError::NotAssigned)?;
        self.mark_dirty();
        owner.request_flush();
        Ok(())
    }

    /// Ask the owning manager to repaint soon. Never blocks on terminal I/O.
    pub fn flush(&self) -> Result<()> {
        self.flush_inner()
    }

    /// Attach a teardown callback, run asynchronously exactly once when the
    /// block closes (immediately if it already is closed).
    pub fn register_closer(&self, f: impl FnOnce() + Send + 'static) {
        let mut st = self.state();
        if st.closed {
            drop(st);
            spawn_closer(Box::new(f));
        } else {
            st.closers.push(Box::new(f));
        }
    }

    /// Close the block. Its owner drops it from the visible region once every
    /// block ahead of it is closed too.
    pub fn close(&self) -> Result<()> {
        let closers = {
            let mut st = self.state();
            if st.closed {
                return Err(BlocksError::Closed);
            }
            st.closed = true;
            std::mem::take(&mut st.closers)
        };
        self.mark_dirty();
        self.inner.done.fire();
        for closer in closers {
            spawn_closer(closer);
        }
        debug!(target: "blocks.block", assigned = self.is_assigned(), "block_closed");
        match self.owner() {
            Some(owner) => owner.settle_closed(self),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn is_hidden(&self) -> bool {
        self.state().hidden
    }

    pub fn view(&self) -> usize {
        self.state().view
    }

    pub fn title_line(&self) -> String {
        self.state().title_line.clone()
    }

    /// Terminal lines this block took at its last paint.
    pub fn last_painted_lines(&self) -> usize {
        self.state().last_painted
    }

    /// Fires once, when the block closes.
    pub fn done(&self) -> Signal {
        self.inner.done.clone()
    }

    pub fn wait(&self) {
        self.inner.done.wait();
    }

    /// Wait for the block to close or `ctx` to be done.
    pub fn wait_with(&self, ctx: &Context) -> Result<()> {
        ctx.wait_for(&self.inner.done)
    }

    /// Paint into `frame`, recording the consumed terminal lines.
    pub(crate) fn emit(&self, frame: &mut Vec<u8>, width: usize, final_pass: bool) -> usize {
        let mut st = self.state();
        let lines = st.render(frame, width, final_pass);
        st.last_painted = lines;
        lines
    }
}

fn spawn_closer(closer: Closer) {
    if let Err(err) = thread::Builder::new()
        .name("block-closer".into())
        .spawn(closer)
    {
        warn!(target: "blocks.block", ?err, "closer_spawn_failed");
    }
}

impl Write for Block {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.append(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut &*self)
    }
}

impl Write for &Block {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.append(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.flush_inner() {
            Ok(()) | Err(BlocksError::NotAssigned) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
