//! Command queue tests: first-ready FCFS pick, precharge suppression, and
//! round-robin fairness.

use dram_core::channel::queue::CommandQueue;
use dram_core::channel::ChannelState;
use dram_core::common::{Address, Command, CommandType};
use dram_core::config::Config;

use crate::common::functional_config;

fn setup(config: &Config) -> (CommandQueue, ChannelState) {
    (CommandQueue::new(config), ChannelState::new(config))
}

fn read_at(bank: usize, row: u64, hex_addr: u64) -> Command {
    let addr = Address {
        bank,
        row,
        ..Address::default()
    };
    Command::new(CommandType::Read, addr, hex_addr)
}

fn act_at(bank: usize, row: u64) -> Command {
    let addr = Address {
        bank,
        row,
        ..Address::default()
    };
    Command::new(CommandType::Activate, addr, 0)
}

#[test]
fn row_hit_beats_an_older_miss() {
    let config = functional_config();
    let (mut queue, mut state) = setup(&config);
    state.update_timing_and_states(&act_at(0, 1), 0);

    queue.add_command(read_at(0, 2, 0x100)); // older, misses the open row
    queue.add_command(read_at(0, 1, 0x200)); // younger, hits

    let picked = queue.get_command_to_issue(&state, 1).unwrap();
    assert_eq!(picked.cmd_type, CommandType::Read);
    assert_eq!(picked.hex_addr, 0x200);
    // The miss stays queued.
    assert_eq!(queue.queue_usage(), 1);
}

#[test]
fn precharge_deferred_while_a_hit_is_pending() {
    let mut config = functional_config();
    // A long column-to-column gap keeps the pending hit briefly unready.
    config.timing.t_ccd_l = 4;
    let (mut queue, mut state) = setup(&config);

    state.update_timing_and_states(&act_at(0, 1), 0);
    state.update_timing_and_states(&read_at(0, 1, 0), 0); // a read just issued

    queue.add_command(read_at(0, 2, 0x100)); // conflict wants a precharge
    queue.add_command(read_at(0, 1, 0x200)); // pending hit

    // While the hit is pending and within its allowance, the open row is
    // kept alive: nothing issues.
    assert!(queue.get_command_to_issue(&state, 2).is_none());

    // Once the hit becomes ready it goes first.
    let picked = queue.get_command_to_issue(&state, 4).unwrap();
    assert_eq!(picked.hex_addr, 0x200);
}

#[test]
fn exhausted_row_allowance_lets_the_precharge_through() {
    let mut config = functional_config();
    config.sched.row_hit_limit = 1;
    config.timing.t_ccd_l = 4;
    let (mut queue, mut state) = setup(&config);

    state.update_timing_and_states(&act_at(0, 1), 0);
    state.update_timing_and_states(&read_at(0, 1, 0), 0); // one hit consumed

    queue.add_command(read_at(0, 2, 0x100));
    queue.add_command(read_at(0, 1, 0x200));

    // The row already served its allowance; the conflict may close it even
    // though a hit is still queued.
    let picked = queue.get_command_to_issue(&state, 2).unwrap();
    assert_eq!(picked.cmd_type, CommandType::Precharge);
}

#[test]
fn mrs_station_drains_first() {
    let config = functional_config();
    let (mut queue, mut state) = setup(&config);
    state.update_timing_and_states(&act_at(0, 1), 0);

    queue.add_command(read_at(0, 1, 0x100)); // immediately issuable hit
    queue.add_command(Command::new(CommandType::Mrs, Address::rank_only(1), 0));

    // Rank 1 is fully idle, so the station wins the tick.
    let picked = queue.get_command_to_issue(&state, 1).unwrap();
    assert_eq!(picked.cmd_type, CommandType::Mrs);
    assert!(queue.will_accept_mrs());
}

#[test]
fn precursor_leaves_the_entry_queued() {
    let config = functional_config();
    let (mut queue, mut state) = setup(&config);
    queue.add_command(read_at(0, 5, 0x100));

    let picked = queue.get_command_to_issue(&state, 0).unwrap();
    assert_eq!(picked.cmd_type, CommandType::Activate);
    assert_eq!(queue.queue_usage(), 1);

    state.update_timing_and_states(&picked, 0);
    let picked = queue.get_command_to_issue(&state, 1).unwrap();
    assert_eq!(picked.cmd_type, CommandType::Read);
    assert_eq!(queue.queue_usage(), 0);
}

#[test]
fn queues_are_walked_round_robin() {
    let config = functional_config();
    let (mut queue, mut state) = setup(&config);
    queue.add_command(read_at(0, 5, 0x100));
    queue.add_command(read_at(1, 5, 0x200));

    let first = queue.get_command_to_issue(&state, 0).unwrap();
    assert_eq!((first.cmd_type, first.bank()), (CommandType::Activate, 0));
    state.update_timing_and_states(&first, 0);

    // Bank 0's read is now issuable, but fairness moves on to bank 1.
    let second = queue.get_command_to_issue(&state, 1).unwrap();
    assert_eq!((second.cmd_type, second.bank()), (CommandType::Activate, 1));
}

#[test]
fn refresh_drain_precharges_open_banks_first() {
    let config = functional_config();
    let (queue, mut state) = setup(&config);
    state.update_timing_and_states(&act_at(0, 3), 0);
    state.rank_need_refresh(0, true);

    let step = queue.finish_refresh(&state, 1).unwrap();
    assert_eq!(step.cmd_type, CommandType::Precharge);
    state.update_timing_and_states(&step, 1);

    let step = queue.finish_refresh(&state, 2).unwrap();
    assert_eq!(step.cmd_type, CommandType::Refresh);
}
