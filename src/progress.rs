/*
 * Copyright 2026 Oxide Computer Company
 */

//! Milestone progress reporting for target instantiation.

use crate::attrs::AttrList;
use crate::keys::progress as k;
use crate::ti::TiErrorCode;
use anyhow::Result;
use std::ops::ControlFlow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub ms_num: u32,
    pub ms_curr: u32,
    pub ms_perc_done: u32,
    pub ms_perc: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Milestone(Milestone),
    /**
     * The request failed; no further events follow.
     */
    Error(TiErrorCode),
}

impl ProgressEvent {
    pub fn to_attrs(&self) -> Result<AttrList> {
        let mut a = AttrList::new();
        match self {
            ProgressEvent::Milestone(m) => {
                a.add_u32(k::MS_NUM, m.ms_num)?;
                a.add_u32(k::MS_CURR, m.ms_curr)?;
                a.add_u32(k::MS_PERC_DONE, m.ms_perc_done)?;
                a.add_u32(k::MS_PERC, m.ms_perc)?;
            }
            ProgressEvent::Error(code) => {
                a.add_u32(k::ERROR, *code as u32)?;
            }
        }
        Ok(a)
    }
}

/**
 * A consumer of progress events.  Returning ControlFlow::Break asks for the
 * request to stop at the next milestone boundary.
 */
pub type ProgressFn<'a> =
    Box<dyn FnMut(&ProgressEvent) -> ControlFlow<()> + 'a>;

pub struct Progress<'a> {
    cb: Option<ProgressFn<'a>>,
    ms_num: u32,
    ms_curr: u32,
    cancelled: bool,
}

impl<'a> Progress<'a> {
    pub fn new(cb: Option<ProgressFn<'a>>) -> Progress<'a> {
        Progress { cb, ms_num: 0, ms_curr: 0, cancelled: false }
    }

    fn emit(&mut self, ev: ProgressEvent) {
        if let Some(cb) = self.cb.as_mut() {
            if cb(&ev).is_break() {
                self.cancelled = true;
            }
        }
    }

    fn milestone(&mut self, done: u32) {
        let done = done.min(100);
        let n = self.ms_num.max(1);
        let ms_perc = (self.ms_curr.saturating_sub(1) * 100 + done) / n;
        self.emit(ProgressEvent::Milestone(Milestone {
            ms_num: self.ms_num,
            ms_curr: self.ms_curr,
            ms_perc_done: done,
            ms_perc,
        }));
    }

    pub fn start(&mut self, ms_num: u32) {
        self.ms_num = ms_num;
        self.ms_curr = 0;
    }

    /**
     * Enter milestone "i" (counting from 1).
     */
    pub fn begin(&mut self, i: u32) {
        self.ms_curr = i;
        self.milestone(0);
    }

    /**
     * Report progress within the current milestone.
     */
    pub fn update(&mut self, done: u32) {
        self.milestone(done);
    }

    pub fn end(&mut self) {
        self.milestone(100);
    }

    pub fn error(&mut self, code: TiErrorCode) {
        self.emit(ProgressEvent::Error(code));
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;

    fn ms(n: u32, c: u32, d: u32, p: u32) -> ProgressEvent {
        ProgressEvent::Milestone(Milestone {
            ms_num: n,
            ms_curr: c,
            ms_perc_done: d,
            ms_perc: p,
        })
    }

    #[test]
    fn percentages() {
        let events = RefCell::new(Vec::new());
        {
            let mut p = Progress::new(Some(Box::new(|e: &ProgressEvent| {
                events.borrow_mut().push(*e);
                ControlFlow::Continue(())
            })));
            p.start(3);
            for i in 1..=3 {
                p.begin(i);
                if i == 2 {
                    p.update(50);
                }
                p.end();
            }
            assert!(!p.cancelled());
        }

        assert_eq!(events.into_inner(), vec![
            ms(3, 1, 0, 0),
            ms(3, 1, 100, 33),
            ms(3, 2, 0, 33),
            ms(3, 2, 50, 50),
            ms(3, 2, 100, 66),
            ms(3, 3, 0, 66),
            ms(3, 3, 100, 100),
        ]);
    }

    #[test]
    fn break_cancels() -> Result<()> {
        let mut p = Progress::new(Some(Box::new(|_: &ProgressEvent| {
            ControlFlow::Break(())
        })));
        p.start(2);
        p.begin(1);
        assert!(p.cancelled());

        let a = ProgressEvent::Error(TiErrorCode::Cancelled).to_attrs()?;
        assert_eq!(a.lookup_u32(k::ERROR)?, TiErrorCode::Cancelled as u32);
        let a = ms(2, 1, 0, 0).to_attrs()?;
        assert_eq!(a.lookup_u32(k::MS_NUM)?, 2);
        Ok(())
    }
}
