//! Context-window extraction over annotated sequences.
//!
//! A [`Snipper`] turns a long sequence of items, each tagged with a
//! must-display flag, into an ordered list of hunks. Displayed hunks hold the
//! flagged items plus up to `radius` neighbours on each side; the items in
//! between are grouped into elided hunks. The first and last `radius` items of
//! the sequence are always displayed.

use std::collections::VecDeque;

use crate::error::{Error, Result};

/// A run of consecutive items, either shown or elided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk<T> {
    pub displayed: bool,
    pub items: Vec<T>,
}

impl<T> Hunk<T> {
    fn shown(items: Vec<T>) -> Self {
        Self { displayed: true, items }
    }

    fn elided(items: Vec<T>) -> Self {
        Self { displayed: false, items }
    }
}

/// Push-based windower. Feed items, then call [`Snipper::finish`] and drain
/// the hunks.
#[derive(Debug)]
pub struct Snipper<T> {
    radius: usize,
    /// Items still forced into the current displayed run.
    follow: Option<usize>,
    /// Undecided items after the displayed run, at most `2 * radius`.
    buff: VecDeque<T>,
    /// Pending elided run.
    snip: Vec<T>,
    /// Current displayed run.
    view: Vec<T>,
    ready: VecDeque<Hunk<T>>,
    finished: bool,
}

impl<T> Snipper<T> {
    pub fn new(radius: usize) -> Result<Self> {
        if radius < 1 {
            return Err(Error::InvalidRadius(radius));
        }
        Ok(Self {
            radius,
            follow: Some(radius - 1),
            buff: VecDeque::new(),
            snip: Vec::new(),
            view: Vec::new(),
            ready: VecDeque::new(),
            finished: false,
        })
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Accept the next item. Items fed after [`Snipper::finish`] are ignored.
    pub fn feed(&mut self, item: T, display: bool) {
        if self.finished {
            return;
        }
        let r = self.radius;
        if let Some(left) = self.follow {
            self.follow = if display { Some(r - 1) } else { left.checked_sub(1) };
            self.view.push(item);
        } else if display {
            self.view.extend(self.buff.drain(..));
            self.view.push(item);
            self.follow = Some(r - 1);
        } else {
            self.buff.push_back(item);
            let len = self.buff.len();
            if len > 2 * r || (len > r && !self.snip.is_empty()) {
                self.flush();
                self.snip.extend(self.buff.drain(..len - r));
            }
        }
    }

    /// Mark the end of input; the remaining buffer is shown as the tail.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.view.extend(self.buff.drain(..));
        self.flush();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next completed hunk, if any has been emitted.
    pub fn pop_hunk(&mut self) -> Option<Hunk<T>> {
        self.ready.pop_front()
    }

    /// Finish and return every hunk.
    pub fn hunks(mut self) -> Vec<Hunk<T>> {
        self.finish();
        self.ready.into_iter().collect()
    }

    fn flush(&mut self) {
        if self.view.is_empty() {
            return;
        }
        if !self.snip.is_empty() {
            self.ready.push_back(Hunk::elided(std::mem::take(&mut self.snip)));
        }
        self.ready.push_back(Hunk::shown(std::mem::take(&mut self.view)));
    }
}

/// Lazy hunk iterator over a source of `(item, display)` pairs.
///
/// The source is only pulled until the next hunk is complete.
pub struct Hunks<T, I> {
    source: I,
    snipper: Snipper<T>,
}

impl<T, I> Iterator for Hunks<T, I>
where
    I: Iterator<Item = (T, bool)>,
{
    type Item = Hunk<T>;

    fn next(&mut self) -> Option<Hunk<T>> {
        loop {
            if let Some(hunk) = self.snipper.pop_hunk() {
                return Some(hunk);
            }
            if self.snipper.is_finished() {
                return None;
            }
            match self.source.next() {
                Some((item, display)) => self.snipper.feed(item, display),
                None => self.snipper.finish(),
            }
        }
    }
}

/// Window `source` with the given radius.
pub fn snip<T, I>(radius: usize, source: I) -> Result<Hunks<T, I::IntoIter>>
where
    I: IntoIterator<Item = (T, bool)>,
{
    Ok(Hunks { source: source.into_iter(), snipper: Snipper::new(radius)? })
}

/// Items of the `n`-th hunk of `source`, pulling no more input than needed.
pub fn nth_hunk<T, I>(radius: usize, source: I, n: usize) -> Result<Option<Vec<T>>>
where
    I: IntoIterator<Item = (T, bool)>,
{
    Ok(snip(radius, source)?.nth(n).map(|hunk| hunk.items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    /// Windows `1..=len` with the given flagged items and returns each hunk as
    /// its first and last item.
    fn ranges(radius: usize, len: u32, flags: &[u32]) -> Vec<(u32, u32)> {
        let hunks: Vec<Hunk<u32>> = snip(radius, (1..=len).map(|i| (i, flags.contains(&i))))
            .unwrap()
            .collect();
        for (idx, hunk) in hunks.iter().enumerate() {
            assert_eq!(hunk.displayed, idx % 2 == 0, "hunks must alternate starting shown");
        }
        hunks
            .iter()
            .map(|h| (h.items[0], *h.items.last().unwrap()))
            .collect()
    }

    #[test]
    fn test_rejects_zero_radius() {
        assert!(matches!(Snipper::<u32>::new(0), Err(Error::InvalidRadius(0))));
    }

    #[test]
    fn test_single_flag_radius_two() {
        let hunks = snip(2, (0..=20).map(|i| (i, i == 10))).unwrap().collect::<Vec<_>>();
        assert_eq!(
            hunks,
            vec![
                Hunk::shown(vec![0, 1]),
                Hunk::elided((2..=7).collect()),
                Hunk::shown((8..=12).collect()),
                Hunk::elided((13..=18).collect()),
                Hunk::shown(vec![19, 20]),
            ]
        );
    }

    #[test]
    fn test_single_flag() {
        assert_eq!(ranges(1, 29, &[15]), vec![(1, 1), (2, 13), (14, 16), (17, 28), (29, 29)]);
        assert_eq!(ranges(2, 29, &[15]), vec![(1, 2), (3, 12), (13, 17), (18, 27), (28, 29)]);
        assert_eq!(ranges(3, 29, &[15]), vec![(1, 3), (4, 11), (12, 18), (19, 26), (27, 29)]);
    }

    #[test]
    fn test_two_flags() {
        assert_eq!(
            ranges(1, 29, &[10, 20]),
            vec![(1, 1), (2, 8), (9, 11), (12, 18), (19, 21), (22, 28), (29, 29)]
        );
        assert_eq!(
            ranges(2, 29, &[10, 20]),
            vec![(1, 2), (3, 7), (8, 12), (13, 17), (18, 22), (23, 27), (28, 29)]
        );
        assert_eq!(ranges(3, 29, &[10, 20]), vec![(1, 29)]);
    }

    #[test]
    fn test_no_flags() {
        for len in 1..=3 {
            assert_eq!(ranges(1, len, &[]), vec![(1, len)]);
        }
        assert_eq!(ranges(1, 4, &[]), vec![(1, 1), (2, 3), (4, 4)]);
        assert_eq!(ranges(1, 5, &[]), vec![(1, 1), (2, 4), (5, 5)]);

        for len in 1..=6 {
            assert_eq!(ranges(2, len, &[]), vec![(1, len)]);
        }
        assert_eq!(ranges(2, 7, &[]), vec![(1, 2), (3, 5), (6, 7)]);
        assert_eq!(ranges(2, 8, &[]), vec![(1, 2), (3, 6), (7, 8)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(snip(2, std::iter::empty::<(u32, bool)>()).unwrap().next().is_none());
        assert!(Snipper::<u32>::new(1).unwrap().hunks().is_empty());
    }

    #[test]
    fn test_push_interface() {
        let mut snipper = Snipper::new(1).unwrap();
        for i in 1..=4 {
            snipper.feed(i, false);
        }
        assert_eq!(snipper.pop_hunk(), Some(Hunk::shown(vec![1])));
        assert_eq!(snipper.pop_hunk(), None);
        assert_eq!(snipper.hunks(), vec![Hunk::elided(vec![2, 3]), Hunk::shown(vec![4])]);
    }

    #[test]
    fn test_nth_hunk_pulls_lazily() {
        let pulled = Cell::new(0);
        let counter = &pulled;
        let source = || {
            (1..=29).map(move |i| {
                counter.set(i);
                (i, i == 10 || i == 20)
            })
        };

        assert_eq!(nth_hunk(2, source(), 0).unwrap(), Some(vec![1, 2]));
        assert_eq!(pulled.get(), 7);

        assert_eq!(nth_hunk(2, source(), 1).unwrap(), Some((3..=7).collect()));
        assert_eq!(pulled.get(), 15);

        assert_eq!(nth_hunk(2, source(), 2).unwrap(), Some((8..=12).collect()));
        assert_eq!(pulled.get(), 15);

        assert_eq!(nth_hunk(2, source(), 7).unwrap(), None);
        assert_eq!(pulled.get(), 29);
    }

    #[test]
    fn test_flagged_neighbourhood_is_displayed() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let radius = rng.gen_range(1..=4);
            let len = rng.gen_range(0..60usize);
            let flags: Vec<bool> = (0..len).map(|_| rng.gen_bool(0.1)).collect();
            let hunks: Vec<_> = snip(radius, (0..len).map(|i| (i, flags[i]))).unwrap().collect();

            let flat: Vec<usize> = hunks.iter().flat_map(|h| h.items.iter().copied()).collect();
            assert_eq!(flat, (0..len).collect::<Vec<_>>());

            let shown: Vec<bool> = hunks
                .iter()
                .flat_map(|h| std::iter::repeat(h.displayed).take(h.items.len()))
                .collect();
            for i in 0..len {
                let near_flag = (i.saturating_sub(radius)..=(i + radius).min(len - 1)).any(|j| flags[j]);
                if near_flag || i < radius || i + radius >= len {
                    assert!(shown[i], "item {i} must be displayed (radius {radius}, flags {flags:?})");
                }
            }
        }
    }
}
