// Approval Ledger Property Tests
// Random interleavings of approve / revoke / execute never execute an action twice

use proptest::prelude::*;
use quorumvault::approval::{
    ActionId, ApprovalConfig, ApprovalLedger, EffectFailurePolicy, Payload,
};
use quorumvault::effects::{ManualClock, MemoryLedger};
use quorumvault::identity::Identity;
use std::sync::Arc;

const AMOUNTS: [u128; 3] = [10, 20, 30];

#[derive(Clone, Debug)]
enum Op {
    Approve(usize, usize),
    Revoke(usize, usize),
    Execute(usize, usize),
    FailNextTransfer,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Caller index 3 is an outsider
    prop_oneof![
        3 => (0..4usize, 0..3usize).prop_map(|(who, action)| Op::Approve(who, action)),
        2 => (0..4usize, 0..3usize).prop_map(|(who, action)| Op::Revoke(who, action)),
        3 => (0..4usize, 0..3usize).prop_map(|(who, action)| Op::Execute(who, action)),
        1 => Just(Op::FailNextTransfer),
    ]
}

struct World {
    ledger: ApprovalLedger,
    funds: Arc<MemoryLedger>,
    people: Vec<Identity>,
    targets: Vec<Identity>,
    ids: Vec<ActionId>,
}

fn world(policy: EffectFailurePolicy) -> World {
    let account = Identity::from_label("wallet");
    let people: Vec<Identity> = ["p0", "p1", "p2", "outsider"]
        .iter()
        .map(|l| Identity::from_label(l))
        .collect();
    let targets: Vec<Identity> = ["t0", "t1", "t2"].iter().map(|l| Identity::from_label(l)).collect();
    let funds = Arc::new(MemoryLedger::new().with_balance(account, 1_000));

    let mut ledger = ApprovalLedger::with_config(
        ApprovalConfig::new().with_effect_failure(policy),
        account,
        people[..3].to_vec(),
        2,
        funds.clone(),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();

    let ids = targets
        .iter()
        .zip(AMOUNTS)
        .enumerate()
        .map(|(i, (target, amount))| ledger.submit(&people[i], *target, Payload::Transfer { amount }).unwrap())
        .collect();

    World {
        ledger,
        funds,
        people,
        targets,
        ids,
    }
}

fn run(world: &mut World, ops: &[Op]) -> [usize; 3] {
    let mut successes = [0usize; 3];
    for op in ops {
        match *op {
            Op::Approve(who, action) => {
                let _ = world.ledger.approve(&world.people[who], world.ids[action]);
            }
            Op::Revoke(who, action) => {
                let _ = world.ledger.revoke(&world.people[who], world.ids[action]);
            }
            Op::Execute(who, action) => {
                if world.ledger.execute(&world.people[who], world.ids[action]).is_ok() {
                    successes[action] += 1;
                }
            }
            Op::FailNextTransfer => world.funds.fail_next_transfers(1),
        }
    }
    successes
}

proptest! {
    #[test]
    fn prop_execute_at_most_once_with_rollback(ops in proptest::collection::vec(op_strategy(), 0..80)) {
        let mut w = world(EffectFailurePolicy::Rollback);
        let successes = run(&mut w, &ops);

        for i in 0..3 {
            prop_assert!(successes[i] <= 1);
            let executed = w.ledger.get_action(w.ids[i]).unwrap().is_executed();
            prop_assert_eq!(executed, successes[i] == 1);
            let expected = if executed { AMOUNTS[i] } else { 0 };
            prop_assert_eq!(w.funds.balance_of(&w.targets[i]), expected);
        }
        prop_assert_eq!(w.funds.transfers().len(), successes.iter().sum::<usize>());
    }

    #[test]
    fn prop_execute_at_most_once_when_sealed(ops in proptest::collection::vec(op_strategy(), 0..80)) {
        let mut w = world(EffectFailurePolicy::Seal);
        let successes = run(&mut w, &ops);

        for i in 0..3 {
            prop_assert!(successes[i] <= 1);
            if successes[i] == 1 {
                prop_assert!(w.ledger.get_action(w.ids[i]).unwrap().is_executed());
                prop_assert_eq!(w.funds.balance_of(&w.targets[i]), AMOUNTS[i]);
            }
        }
        prop_assert!(w.funds.transfers().len() <= 3);
    }

    #[test]
    fn prop_confirmations_bounded_by_participants(ops in proptest::collection::vec(op_strategy(), 0..80)) {
        let mut w = world(EffectFailurePolicy::Rollback);
        run(&mut w, &ops);

        for id in &w.ids {
            let count = w.ledger.confirmation_count(*id);
            prop_assert!(count <= w.ledger.participants().len());
            prop_assert_eq!(count, w.ledger.approvers(*id).len());
        }
    }
}
