//! Collaborator notification: observers see every issued command and every
//! tick, in order.

use dram_core::common::{CommandType, Transaction};
use mockall::predicate;

use crate::common::mocks::{MockObserver, RecordingObserver};
use crate::common::{controller, tick_n};

#[test]
fn observer_sees_each_issued_command() {
    let mut ctrl = controller();
    let mut mock = MockObserver::new();
    // One activate plus one read over three ticks.
    mock.expect_command_issued().times(2).returning(|_, _| ());
    mock.expect_post_tick().times(3).returning(|_| ());
    ctrl.add_observer(Box::new(mock));

    ctrl.add_transaction(Transaction::read(0x3000));
    tick_n(&mut ctrl, 3);
}

#[test]
fn observer_sees_issue_clock() {
    let mut ctrl = controller();
    let mut mock = MockObserver::new();
    mock.expect_command_issued()
        .with(predicate::always(), predicate::ge(1u64))
        .returning(|_, _| ());
    mock.expect_post_tick().returning(|_| ());
    ctrl.add_observer(Box::new(mock));

    ctrl.add_transaction(Transaction::read(0x3000));
    tick_n(&mut ctrl, 3);
}

#[test]
fn commands_observed_in_issue_order() {
    let mut ctrl = controller();
    let (observer, log) = RecordingObserver::new();
    ctrl.add_observer(Box::new(observer));

    ctrl.add_transaction(Transaction::read(0x3000));
    tick_n(&mut ctrl, 3);

    let log = log.borrow();
    let kinds: Vec<CommandType> = log.iter().map(|(_, c)| c.cmd_type).collect();
    assert_eq!(kinds, vec![CommandType::Activate, CommandType::Read]);
    assert!(log[0].0 < log[1].0, "activate precedes the read in time");
}
