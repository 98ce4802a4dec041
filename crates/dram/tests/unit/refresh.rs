//! Refresh behavior through the controller: obligations are honored, the
//! channel keeps making progress, and both granularities work.

use dram_core::common::Transaction;
use dram_core::config::RefreshPolicy;
use dram_core::Controller;

use crate::common::{drain, functional_config, tick_n};

#[test]
fn rank_refresh_fires_on_the_interval() {
    let mut config = functional_config();
    config.timing.t_refi = 8;
    let mut ctrl = Controller::new(0, &config);

    tick_n(&mut ctrl, 100);
    // Roughly one refresh per interval; each is satisfied promptly with no
    // timing constraints in the way.
    assert!(ctrl.stats().num_ref_cmds >= 10);
}

#[test]
fn bank_refresh_fires_under_bank_staggering() {
    let mut config = functional_config();
    config.timing.refresh_policy = RefreshPolicy::BankStaggered;
    config.timing.t_refib = 4;
    let mut ctrl = Controller::new(0, &config);

    tick_n(&mut ctrl, 100);
    assert!(ctrl.stats().num_refb_cmds >= 20);
    assert_eq!(ctrl.stats().num_ref_cmds, 0);
}

#[test]
fn reads_complete_despite_refresh_pressure() {
    let mut config = functional_config();
    config.timing.t_refi = 4;
    let mut ctrl = Controller::new(0, &config);

    for i in 0..5u64 {
        ctrl.add_transaction(Transaction::read(i * 0x400));
    }
    tick_n(&mut ctrl, 200);

    assert_eq!(ctrl.stats().num_read_cmds, 5);
    let clk = ctrl.clk();
    assert_eq!(drain(&mut ctrl, clk, 8).len(), 5);
    assert!(ctrl.stats().num_ref_cmds > 0);
}

#[test]
fn refresh_closes_open_rows_on_its_way() {
    let mut config = functional_config();
    config.timing.t_refi = 10;
    let mut ctrl = Controller::new(0, &config);

    // Open a row in rank 0, then let the interval fire.
    ctrl.add_transaction(Transaction::read(0x40));
    tick_n(&mut ctrl, 30);

    // The obligation was only satisfiable after a precharge.
    assert!(ctrl.stats().num_ref_cmds > 0);
    assert!(ctrl.stats().num_pre_cmds > 0);
}
