//! Streaming rows into backtracking search
//!
//! An [`ItemStream`] pulls rows from a [`Cursor`] one at a time and turns
//! each into a term. The cursor is opened lazily on the first pull and
//! closed exactly once: when the rows run out, when the cursor fails, or
//! when the stream is cancelled or dropped.

use datalog_core::{unify_into, Substitution};
use datalog_parser::Term;
use kv_storage::{Cursor, StoreResult};
use tracing::{debug, trace, warn};

use crate::error::BuiltinResult;

/// Lazy sequence of solutions produced by a predicate call
pub type Solutions = Box<dyn Iterator<Item = BuiltinResult<Substitution>>>;

/// A single solution
pub fn succeed(subst: Substitution) -> Solutions {
    Box::new(std::iter::once(Ok(subst)))
}

/// No solutions
pub fn fail() -> Solutions {
    Box::new(std::iter::empty())
}

/// Run `action` when the first solution is pulled; `Ok(None)` is failure
pub fn deferred<F>(action: F) -> Solutions
where
    F: FnOnce() -> BuiltinResult<Option<Substitution>> + 'static,
{
    Box::new(std::iter::once_with(action).filter_map(Result::transpose))
}

/// Zero or one solution from unifying two terms
pub fn unify_once(left: &Term, right: &Term, subst: &Substitution) -> Solutions {
    match unify_into(left, right, subst) {
        Some(extended) => succeed(extended),
        None => fail(),
    }
}

/// One solution per streamed term that unifies with `pattern`
pub fn unify_stream<C, D>(stream: ItemStream<C, D>, pattern: Term, subst: Substitution) -> Solutions
where
    C: Cursor + 'static,
    D: FnMut(C::Item) -> Term + 'static,
{
    Box::new(stream.filter_map(move |row| match row {
        Ok(term) => unify_into(&pattern, &term, &subst).map(Ok),
        Err(error) => Some(Err(error)),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Cursor not opened yet
    Idle,
    Streaming,
    /// Rows ran out or the stream was cancelled
    Exhausted,
    /// The cursor reported an error
    Failed,
}

type Opener<C> = Box<dyn FnOnce() -> StoreResult<C>>;

/// Adapts a [`Cursor`] to an iterator of decoded terms
pub struct ItemStream<C: Cursor, D> {
    state: StreamState,
    opener: Option<Opener<C>>,
    cursor: Option<C>,
    decode: D,
}

impl<C, D> ItemStream<C, D>
where
    C: Cursor,
    D: FnMut(C::Item) -> Term,
{
    pub fn new(opener: impl FnOnce() -> StoreResult<C> + 'static, decode: D) -> Self {
        ItemStream {
            state: StreamState::Idle,
            opener: Some(Box::new(opener)),
            cursor: None,
            decode,
        }
    }
}

impl<C: Cursor, D> ItemStream<C, D> {
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Stop early. A live cursor is closed; later pulls yield nothing.
    pub fn cancel(&mut self) {
        self.opener = None;
        if self.state != StreamState::Failed {
            self.release(StreamState::Exhausted);
        }
    }

    fn release(&mut self, state: StreamState) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
            debug!(?state, "cursor closed");
        }
        self.state = state;
    }
}

impl<C, D> Iterator for ItemStream<C, D>
where
    C: Cursor,
    D: FnMut(C::Item) -> Term,
{
    type Item = BuiltinResult<Term>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == StreamState::Idle {
            let opener = self.opener.take()?;
            match opener() {
                Ok(cursor) => {
                    debug!("cursor opened");
                    self.cursor = Some(cursor);
                    self.state = StreamState::Streaming;
                }
                Err(error) => {
                    warn!(%error, "cursor failed to open");
                    self.state = StreamState::Failed;
                    return Some(Err(error.into()));
                }
            }
        }

        let cursor = self.cursor.as_mut()?;
        match cursor.next() {
            Ok(Some(row)) => {
                trace!("row");
                Some(Ok((self.decode)(row)))
            }
            Ok(None) => {
                self.release(StreamState::Exhausted);
                None
            }
            Err(error) => {
                warn!(%error, "cursor failed");
                self.release(StreamState::Failed);
                Some(Err(error.into()))
            }
        }
    }
}

impl<C: Cursor, D> Drop for ItemStream<C, D> {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
            debug!("cursor closed on drop");
        }
    }
}

/// Cursor over a single lookup; the fetch runs on the first `next`
pub struct LookupCursor<F> {
    fetch: Option<F>,
}

impl<F> LookupCursor<F> {
    pub fn new(fetch: F) -> Self {
        LookupCursor { fetch: Some(fetch) }
    }
}

impl<F, T> Cursor for LookupCursor<F>
where
    F: FnOnce() -> StoreResult<Option<T>>,
{
    type Item = T;

    fn next(&mut self) -> StoreResult<Option<T>> {
        match self.fetch.take() {
            Some(fetch) => fetch(),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.fetch = None;
    }
}

/// Cursor over a list of names fetched up front
pub struct NameCursor {
    names: std::vec::IntoIter<String>,
}

impl NameCursor {
    pub fn new(names: Vec<String>) -> Self {
        NameCursor {
            names: names.into_iter(),
        }
    }
}

impl Cursor for NameCursor {
    type Item = String;

    fn next(&mut self) -> StoreResult<Option<String>> {
        Ok(self.names.next())
    }

    fn close(&mut self) {
        self.names = Vec::new().into_iter();
    }
}

/// Cursor over `low..=high`
pub struct RangeCursor {
    next: Option<i64>,
    high: i64,
}

impl RangeCursor {
    pub fn new(low: i64, high: i64) -> Self {
        RangeCursor {
            next: Some(low),
            high,
        }
    }
}

impl Cursor for RangeCursor {
    type Item = i64;

    fn next(&mut self) -> StoreResult<Option<i64>> {
        match self.next {
            Some(value) if value <= self.high => {
                self.next = value.checked_add(1);
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    fn close(&mut self) {
        self.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_storage::StoreError;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Cursor that replays a script and counts how often it is opened and closed
    struct ScriptedCursor {
        script: VecDeque<StoreResult<Option<&'static str>>>,
        closes: Rc<Cell<usize>>,
    }

    impl Cursor for ScriptedCursor {
        type Item = &'static str;

        fn next(&mut self) -> StoreResult<Option<&'static str>> {
            self.script.pop_front().unwrap_or(Ok(None))
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    struct Probe {
        opens: Rc<Cell<usize>>,
        closes: Rc<Cell<usize>>,
    }

    fn scripted(
        script: Vec<StoreResult<Option<&'static str>>>,
    ) -> (
        ItemStream<ScriptedCursor, impl FnMut(&'static str) -> Term>,
        Probe,
    ) {
        let opens = Rc::new(Cell::new(0));
        let closes = Rc::new(Cell::new(0));
        let probe = Probe {
            opens: Rc::clone(&opens),
            closes: Rc::clone(&closes),
        };
        let stream = ItemStream::new(
            move || {
                opens.set(opens.get() + 1);
                Ok(ScriptedCursor {
                    script: script.into(),
                    closes,
                })
            },
            Term::atom,
        );
        (stream, probe)
    }

    fn rows(names: &[&'static str]) -> Vec<StoreResult<Option<&'static str>>> {
        names.iter().map(|name| Ok(Some(*name))).collect()
    }

    #[test]
    fn test_streams_rows_in_order() {
        let (mut stream, probe) = scripted(rows(&["a", "b", "c"]));
        assert_eq!(stream.state(), StreamState::Idle);

        let terms: Vec<Term> = stream.by_ref().map(Result::unwrap).collect();
        assert_eq!(terms, vec![Term::atom("a"), Term::atom("b"), Term::atom("c")]);
        assert_eq!(stream.state(), StreamState::Exhausted);
        assert_eq!(probe.opens.get(), 1);
        assert_eq!(probe.closes.get(), 1);

        // fused
        assert!(stream.next().is_none());
        drop(stream);
        assert_eq!(probe.closes.get(), 1);
    }

    #[test]
    fn test_opens_lazily() {
        let (mut stream, probe) = scripted(rows(&["a"]));
        assert_eq!(probe.opens.get(), 0);
        assert_eq!(stream.next(), Some(Ok(Term::atom("a"))));
        assert_eq!(probe.opens.get(), 1);
        assert_eq!(stream.state(), StreamState::Streaming);
    }

    #[test]
    fn test_does_not_read_ahead() {
        let pulled = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&pulled);
        let mut stream = ItemStream::new(
            || Ok(RangeCursor::new(1, 100)),
            move |n: i64| {
                log.borrow_mut().push(n);
                Term::integer(n)
            },
        );
        stream.next();
        stream.next();
        assert_eq!(*pulled.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_error_on_second_row() {
        let (mut stream, probe) = scripted(vec![
            Ok(Some("a")),
            Err(StoreError::Backend("connection reset".to_string())),
            Ok(Some("never")),
        ]);
        assert_eq!(stream.next(), Some(Ok(Term::atom("a"))));
        assert!(matches!(stream.next(), Some(Err(error)) if error.is_store_error()));
        assert_eq!(stream.state(), StreamState::Failed);
        assert_eq!(probe.closes.get(), 1);
        assert!(stream.next().is_none());
        drop(stream);
        assert_eq!(probe.closes.get(), 1);
    }

    #[test]
    fn test_opener_error() {
        let mut stream: ItemStream<NameCursor, _> = ItemStream::new(
            || Err(StoreError::TableNotFound("missing".to_string())),
            |name: String| Term::atom(&name),
        );
        assert!(matches!(stream.next(), Some(Err(error)) if error.is_store_error()));
        assert_eq!(stream.state(), StreamState::Failed);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_cancel_after_first_row() {
        let (mut stream, probe) = scripted(rows(&["a", "b", "c"]));
        assert_eq!(stream.next(), Some(Ok(Term::atom("a"))));
        stream.cancel();
        assert_eq!(stream.state(), StreamState::Exhausted);
        assert_eq!(probe.closes.get(), 1);
        assert!(stream.next().is_none());
        stream.cancel();
        drop(stream);
        assert_eq!(probe.closes.get(), 1);
    }

    #[test]
    fn test_drop_closes_live_cursor() {
        let (mut stream, probe) = scripted(rows(&["a", "b"]));
        stream.next();
        drop(stream);
        assert_eq!(probe.closes.get(), 1);
    }

    #[test]
    fn test_cancel_before_open_never_opens() {
        let (mut stream, probe) = scripted(rows(&["a"]));
        stream.cancel();
        assert!(stream.next().is_none());
        assert_eq!(probe.opens.get(), 0);
        assert_eq!(probe.closes.get(), 0);
    }

    #[test]
    fn test_empty_cursor() {
        let (mut stream, probe) = scripted(Vec::new());
        assert!(stream.next().is_none());
        assert_eq!(stream.state(), StreamState::Exhausted);
        assert_eq!(probe.closes.get(), 1);
    }

    #[test]
    fn test_unify_stream_skips_non_matching_rows() {
        let (stream, probe) = scripted(rows(&["a", "b", "a"]));
        let solutions = unify_stream(stream, Term::atom("a"), Substitution::new());
        assert_eq!(solutions.count(), 2);
        assert_eq!(probe.closes.get(), 1);
    }

    #[test]
    fn test_lookup_cursor() {
        let mut found = LookupCursor::new(|| Ok(Some(1)));
        assert_eq!(found.next(), Ok(Some(1)));
        assert_eq!(found.next(), Ok(None));

        let mut missing = LookupCursor::new(|| Ok(None::<i64>));
        assert_eq!(missing.next(), Ok(None));

        let mut closed = LookupCursor::new(|| Ok(Some(1)));
        closed.close();
        assert_eq!(closed.next(), Ok(None));
    }

    #[test]
    fn test_range_cursor_stops_at_max() {
        let mut cursor = RangeCursor::new(i64::MAX - 1, i64::MAX);
        assert_eq!(cursor.next(), Ok(Some(i64::MAX - 1)));
        assert_eq!(cursor.next(), Ok(Some(i64::MAX)));
        assert_eq!(cursor.next(), Ok(None));
    }

    #[test]
    fn test_deferred_runs_on_pull() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let mut solutions = deferred(move || {
            flag.set(true);
            Ok(Some(Substitution::new()))
        });
        assert!(!ran.get());
        assert!(matches!(solutions.next(), Some(Ok(_))));
        assert!(ran.get());
        assert!(solutions.next().is_none());

        let mut failing = deferred(|| Ok(None));
        assert!(failing.next().is_none());
    }
}
