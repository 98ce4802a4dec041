//! Mock collaborators for observer-facing tests.

use std::cell::RefCell;
use std::rc::Rc;

use mockall::mock;

use dram_core::common::Command;
use dram_core::traits::CommandObserver;

mock! {
    pub Observer {}
    impl CommandObserver for Observer {
        fn command_issued(&mut self, cmd: &Command, clk: u64);
        fn post_tick(&mut self, clk: u64);
    }
}

/// Records every issued command in order, for sequencing assertions.
pub struct RecordingObserver {
    log: Rc<RefCell<Vec<(u64, Command)>>>,
}

impl RecordingObserver {
    /// The observer plus a shared handle onto its log.
    pub fn new() -> (Self, Rc<RefCell<Vec<(u64, Command)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (Self { log: Rc::clone(&log) }, log)
    }
}

impl CommandObserver for RecordingObserver {
    fn command_issued(&mut self, cmd: &Command, clk: u64) {
        self.log.borrow_mut().push((clk, *cmd));
    }
}
