//! Region manager: the ordered sequence of blocks anchored to the bottom of an
//! output stream.
//!
//! All terminal writes go through `Shared::paint` or `Shared::discard_closed`,
//! both under the sequence write lock. Scheduled paints run on the repaint
//! worker; `flush`/`repaint` and the close path of a block run them on the
//! caller's thread. Each pass builds one frame (erase sequence followed by
//! the emitted blocks) and hands it to the writer at once.

use crate::block::{Block, DEFAULT_VIEW};
use crate::error::{BlocksError, Result};
use crate::metrics::{PaintMetrics, PaintMetricsSnapshot};
use crate::scheduler::{MIN_UPDATE_INTERVAL, RepaintScheduler};
use crate::signal::{Context, Signal};
use core_terminal::{ClearLines, TerminalInfo, select_clear};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// How much of the region a paint pass rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepaintMode {
    /// Erase and re-emit every block.
    Full,
    /// Keep the unchanged prefix; rewrite from the first dirty block on.
    #[default]
    Delta,
}

impl RepaintMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaintMode::Full => "full",
            RepaintMode::Delta => "delta",
        }
    }
}

/// What a paint pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintOutcome {
    pub mode: RepaintMode,
    pub erased: usize,
    pub emitted: usize,
    pub bytes: usize,
}

struct State {
    out: Mutex<Box<dyn Write + Send>>,
    clear: Box<dyn ClearLines>,
    term_width: usize,
    blocks: Vec<Block>,
    line_count: usize,
    closed: bool,
    close_on_done: bool,
}

impl State {
    fn position(&self, block: &Block) -> Option<usize> {
        self.blocks.iter().position(|b| b.same(block))
    }

    fn write_frame(&self, frame: &[u8]) -> io::Result<()> {
        if frame.is_empty() {
            return Ok(());
        }
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(frame)?;
        out.flush()
    }

    fn should_finish(&self) -> bool {
        self.blocks.is_empty() && (self.closed || self.close_on_done)
    }
}

pub(crate) struct Shared {
    state: RwLock<State>,
    scheduler: RepaintScheduler,
    done: Signal,
    ctx: Context,
    mode: RepaintMode,
    default_view: usize,
    metrics: PaintMetrics,
}

enum Placement<'a> {
    Tail,
    After(&'a Block),
    Before(&'a Block),
}

impl Shared {
    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking; coalesced by the scheduler gate.
    pub(crate) fn request_flush(&self) {
        PaintMetrics::incr(&self.metrics.flush_requests);
        if !self.scheduler.request() {
            PaintMetrics::incr(&self.metrics.coalesced_requests);
        }
    }

    /// One pass on the repaint worker. Failures are only logged; the next
    /// request retries.
    fn scheduled_paint(&self) {
        if let Err(err) = self.paint(self.mode) {
            warn!(target: "blocks.scheduler", %err, "scheduled_paint_failed");
        }
    }

    fn paint(&self, mode: RepaintMode) -> Result<Option<PaintOutcome>> {
        let started = Instant::now();
        let mut guard = self.write_state();
        let st = &mut *guard;

        let first = match mode {
            RepaintMode::Full => 0,
            RepaintMode::Delta => match st.blocks.iter().position(Block::take_dirty) {
                Some(i) => i,
                None => {
                    PaintMetrics::incr(&self.metrics.skipped_paints);
                    trace!(target: "blocks.paint", "delta_skipped");
                    return Ok(None);
                }
            },
        };

        let kept: usize = st.blocks[..first]
            .iter()
            .map(Block::last_painted_lines)
            .sum();
        let erased = st.line_count.saturating_sub(kept);
        let mut frame = Vec::new();
        st.clear.erase(&mut frame, erased)?;

        let mut emitted = 0;
        for block in &st.blocks[first..] {
            block.take_dirty();
            emitted += block.emit(&mut frame, st.term_width, false);
        }
        st.line_count = kept + emitted;

        let bytes = frame.len();
        if let Err(err) = st.write_frame(&frame) {
            PaintMetrics::incr(&self.metrics.paint_errors);
            return Err(err.into());
        }

        let counter = match mode {
            RepaintMode::Full => &self.metrics.full_paints,
            RepaintMode::Delta => &self.metrics.delta_paints,
        };
        PaintMetrics::incr(counter);
        PaintMetrics::add(&self.metrics.lines_erased, erased);
        PaintMetrics::add(&self.metrics.lines_emitted, emitted);
        PaintMetrics::add(&self.metrics.bytes_written, bytes);
        self.metrics.record_duration(started.elapsed());
        trace!(
            target: "blocks.paint",
            mode = mode.as_str(),
            first,
            erased,
            emitted,
            bytes,
            "paint"
        );
        Ok(Some(PaintOutcome {
            mode,
            erased,
            emitted,
            bytes,
        }))
    }

    /// Remove the closed prefix of the sequence, printing each removed
    /// block's final paint, then repaint the rest.
    fn discard_closed(&self) -> Result<()> {
        let mut guard = self.write_state();
        let st = &mut *guard;
        if !st.blocks.first().is_some_and(Block::is_closed) {
            return Ok(());
        }

        let started = Instant::now();
        let erased = st.line_count;
        let mut frame = Vec::new();
        st.clear.erase(&mut frame, erased)?;

        let mut discarded = 0;
        let mut emitted = 0;
        while st.blocks.first().is_some_and(Block::is_closed) {
            let block = st.blocks.remove(0);
            block.take_dirty();
            emitted += block.emit(&mut frame, st.term_width, true);
            discarded += 1;
        }
        let mut live = 0;
        for block in &st.blocks {
            block.take_dirty();
            live += block.emit(&mut frame, st.term_width, false);
        }
        st.line_count = live;

        let bytes = frame.len();
        let written = st.write_frame(&frame);
        let finished = st.should_finish();
        let remaining = st.blocks.len();
        drop(guard);

        PaintMetrics::add(&self.metrics.discarded_blocks, discarded);
        if let Err(err) = written {
            PaintMetrics::incr(&self.metrics.paint_errors);
            if finished {
                self.done.fire();
            }
            return Err(err.into());
        }
        PaintMetrics::incr(&self.metrics.full_paints);
        PaintMetrics::add(&self.metrics.lines_erased, erased);
        PaintMetrics::add(&self.metrics.lines_emitted, emitted + live);
        PaintMetrics::add(&self.metrics.bytes_written, bytes);
        self.metrics.record_duration(started.elapsed());
        debug!(
            target: "blocks.discard",
            discarded,
            remaining,
            erased,
            final_lines = emitted,
            live_lines = live,
            "discard_closed"
        );

        if finished {
            self.done.fire();
        }
        Ok(())
    }

    /// Follow-up for a closed block in the sequence: drain the closed head,
    /// or schedule a repaint so the block's final paint shows in place.
    pub(crate) fn settle_closed(&self, block: &Block) -> Result<()> {
        self.discard_closed()?;
        if self.read_state().position(block).is_some() {
            self.request_flush();
        }
        Ok(())
    }

    /// Silently ignored once the manager is closed or `done` has fired: no
    /// worker would ever paint the block.
    fn register(self: &Arc<Self>, block: &Block, at: Placement<'_>) -> Result<()> {
        let mut st = self.write_state();
        if st.closed || st.should_finish() || self.done.is_fired() {
            debug!(target: "blocks.block", "registration_after_done_ignored");
            return Ok(());
        }
        block.assign(self)?;
        let index = match at {
            Placement::Tail => None,
            Placement::After(anchor) => st.position(anchor).map(|i| i + 1),
            Placement::Before(anchor) => st.position(anchor),
        };
        let index = index.unwrap_or(st.blocks.len());
        block.mark_dirty();
        st.blocks.insert(index, block.clone());
        debug!(target: "blocks.block", index, len = st.blocks.len(), "block_registered");
        drop(st);
        if block.is_closed() {
            self.settle_closed(block)?;
        }
        Ok(())
    }
}

/// Builder for a [`Blocks`] region manager.
pub struct BlocksBuilder {
    out: Option<Box<dyn Write + Send>>,
    terminal: TerminalInfo,
    console: Option<bool>,
    interval: Duration,
    mode: RepaintMode,
    default_view: usize,
    ctx: Context,
}

impl Default for BlocksBuilder {
    fn default() -> Self {
        Self {
            out: None,
            terminal: TerminalInfo::plain(),
            console: None,
            interval: MIN_UPDATE_INTERVAL,
            mode: RepaintMode::default(),
            default_view: DEFAULT_VIEW,
            ctx: Context::background(),
        }
    }
}

impl BlocksBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paint into `out` instead of stdout. Width accounting stays disabled
    /// unless a width is set explicitly.
    pub fn output(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Some(Box::new(out));
        self
    }

    /// Paint to stdout using the detected terminal properties.
    pub fn stdout(mut self) -> Self {
        self.out = Some(Box::new(io::stdout()));
        self.terminal = TerminalInfo::detect_stdout();
        self
    }

    pub fn terminal(mut self, info: TerminalInfo) -> Self {
        self.terminal = info;
        self
    }

    /// Terminal width used for wrap accounting; `0` disables it.
    pub fn term_width(mut self, width: u16) -> Self {
        self.terminal.width = width;
        self
    }

    /// Whether the output is a real console (selects the clear strategy).
    pub fn console(mut self, console: bool) -> Self {
        self.console = Some(console);
        self
    }

    /// Minimum pause between scheduled paints. Clamped to at least 1ms.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn mode(mut self, mode: RepaintMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn default_view(mut self, view: usize) -> Self {
        self.default_view = view.max(1);
        self
    }

    /// Context bounding the manager's lifetime; canceling it fires `done`.
    pub fn context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn build(self) -> Result<Blocks> {
        let out = self.out.unwrap_or_else(|| Box::new(io::stdout()));
        let console = self.console.unwrap_or(self.terminal.is_tty);
        let clear = select_clear(console);
        let term_width = if self.terminal.overflow_handled() {
            usize::from(self.terminal.width)
        } else {
            0
        };
        let (scheduler, worker) = RepaintScheduler::new(self.interval);
        let done = Signal::new();

        debug!(
            target: "blocks.scheduler",
            clear = clear.name(),
            term_width,
            mode = self.mode.as_str(),
            interval_ms = self.interval.as_millis() as u64,
            "blocks_created"
        );

        let shared = Arc::new(Shared {
            state: RwLock::new(State {
                out: Mutex::new(out),
                clear,
                term_width,
                blocks: Vec::new(),
                line_count: 0,
                closed: false,
                close_on_done: false,
            }),
            scheduler,
            done: done.clone(),
            ctx: self.ctx.clone(),
            mode: self.mode,
            default_view: self.default_view,
            metrics: PaintMetrics::default(),
        });

        let weak = Arc::downgrade(&shared);
        worker.spawn(done, self.ctx, move || match weak.upgrade() {
            Some(shared) => {
                shared.scheduled_paint();
                true
            }
            None => false,
        })?;

        Ok(Blocks { shared })
    }
}

/// Handle to a region manager. Clones share the same region.
#[derive(Clone)]
pub struct Blocks {
    shared: Arc<Shared>,
}

impl fmt::Debug for Blocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.read_state();
        f.debug_struct("Blocks")
            .field("len", &st.blocks.len())
            .field("line_count", &st.line_count)
            .field("closed", &st.closed)
            .field("mode", &self.shared.mode)
            .finish()
    }
}

impl Blocks {
    pub fn builder() -> BlocksBuilder {
        BlocksBuilder::new()
    }

    /// Manager painting to stdout with detected terminal properties.
    pub fn stdout() -> Result<Self> {
        BlocksBuilder::new().stdout().build()
    }

    /// Manager painting to `out` with default options.
    pub fn new(out: impl Write + Send + 'static) -> Result<Self> {
        BlocksBuilder::new().output(out).build()
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Register `block` at the tail. No-op once the manager is closed.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        self.shared.register(block, Placement::Tail)
    }

    /// Register `block` right after `anchor` (tail if `anchor` is absent).
    pub fn append_block(&self, block: &Block, anchor: &Block) -> Result<()> {
        self.shared.register(block, Placement::After(anchor))
    }

    /// Register `block` right before `anchor` (tail if `anchor` is absent).
    pub fn insert_block(&self, block: &Block, anchor: &Block) -> Result<()> {
        self.shared.register(block, Placement::Before(anchor))
    }

    /// Create and register a block with the given window size. Returns `None`
    /// when the manager is already closed.
    pub fn new_block(&self, view: usize) -> Option<Block> {
        self.create(view, Placement::Tail)
    }

    pub fn new_default_block(&self) -> Option<Block> {
        self.create(self.shared.default_view, Placement::Tail)
    }

    pub fn new_appended_block(&self, anchor: &Block, view: usize) -> Option<Block> {
        self.create(view, Placement::After(anchor))
    }

    pub fn new_inserted_block(&self, anchor: &Block, view: usize) -> Option<Block> {
        self.create(view, Placement::Before(anchor))
    }

    fn create(&self, view: usize, at: Placement<'_>) -> Option<Block> {
        let block = Block::new(view);
        // A fresh block cannot be assigned yet; the only outcome is "closed".
        self.shared.register(&block, at).ok()?;
        block.is_assigned().then_some(block)
    }

    /// Close the manager. `done` fires as soon as the sequence is empty.
    pub fn close(&self) -> Result<()> {
        let finished = {
            let mut st = self.shared.write_state();
            if st.closed {
                return Err(BlocksError::Closed);
            }
            st.closed = true;
            st.should_finish()
        };
        debug!(target: "blocks.block", finished, "blocks_closed");
        if finished {
            self.shared.done.fire();
        }
        Ok(())
    }

    /// Fire `done` once the sequence drains. Blocks are accepted until then;
    /// on an empty sequence `done` fires right away and later registrations
    /// are ignored.
    pub fn close_on_done(&self) {
        let mut st = self.shared.write_state();
        st.close_on_done = true;
        if st.should_finish() {
            // Fired under the lock; `register` checks `done`.
            self.shared.done.fire();
        }
    }

    /// Ask the repaint worker for a pass. Never blocks.
    pub fn request_flush(&self) {
        self.shared.request_flush();
    }

    /// Synchronous full repaint.
    pub fn flush(&self) -> Result<()> {
        self.shared.paint(RepaintMode::Full).map(drop)
    }

    /// One synchronous paint pass; `None` when a delta pass found nothing dirty.
    pub fn repaint(&self, mode: RepaintMode) -> Result<Option<PaintOutcome>> {
        self.shared.paint(mode)
    }

    pub fn wait(&self) {
        self.shared.done.wait();
    }

    pub fn wait_with(&self, ctx: &Context) -> Result<()> {
        ctx.wait_for(&self.shared.done)
    }

    pub fn done(&self) -> Signal {
        self.shared.done.clone()
    }

    pub fn is_done(&self) -> bool {
        self.shared.done.is_fired()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.read_state().closed
    }

    /// Snapshot of the registered blocks in display order.
    pub fn blocks(&self) -> Vec<Block> {
        self.shared.read_state().blocks.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.read_state().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.read_state().blocks.is_empty()
    }

    /// Terminal lines painted by the last pass.
    pub fn painted_lines(&self) -> usize {
        self.shared.read_state().line_count
    }

    /// Width used for wrap accounting (`0` when disabled).
    pub fn term_width(&self) -> usize {
        self.shared.read_state().term_width
    }

    pub fn mode(&self) -> RepaintMode {
        self.shared.mode
    }

    pub fn interval(&self) -> Duration {
        self.shared.scheduler.interval()
    }

    pub fn default_view(&self) -> usize {
        self.shared.default_view
    }

    pub fn context(&self) -> &Context {
        &self.shared.ctx
    }

    pub fn metrics(&self) -> PaintMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}
