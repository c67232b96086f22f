//! End-to-end scenarios from §8 exercising the Cartesian CEGAR heuristic
//! against a preprocessed task.

use sas_cartesian::cegar::{self, CegarConfig};
use sas_cartesian::cost_saturation::{build_additive_heuristics, SubtaskGoal};
use sas_cartesian::split_selector::PickSplit;
use sas_collections::ref_store::{RefStore, RefVec};
use sas_task::model::{Effect, Fact, Operator, Task, Variable};

fn var(name: &str, domain: u32) -> Variable {
    Variable {
        name: name.into(),
        domain_size: domain,
        axiom_layer: -1,
        default_value: 0,
        level: -1,
        necessary: true,
        value_names: vec![],
    }
}

/// Variables v0..v2, each {0,1}; init (0,0,0); goal (1,1,1); operator oi
/// flips vi 0->1 at cost 1.
fn chain_task() -> Task {
    let mut variables = RefStore::new();
    let vs: Vec<_> = (0..3).map(|i| variables.push(var(&format!("v{i}"), 2))).collect();
    let mut operators = RefStore::new();
    for &v in &vs {
        operators.push(Operator {
            name: format!("o{}", usize::from(v)),
            preconditions: vec![],
            effects: vec![Effect { fact: Fact::new(v, 1), precondition_value: Some(0), conditions: vec![] }],
            cost: 1,
        });
    }
    let goal = vs.iter().map(|&v| Fact::new(v, 1)).collect();
    Task::new(variables, operators, RefStore::new(), vec![], vec![0, 0, 0], goal, false).unwrap()
}

#[test]
fn scenario_4_cegar_on_a_chain_task() {
    let raw = chain_task();
    let pre = sas_task::preprocess(&raw, true).unwrap();

    let mut costs: RefVec<sas_task::ids::OpId, i64> = RefVec::new();
    for (_, op) in pre.task.operators.entries() {
        costs.push(op.cost as i64);
    }

    let config = CegarConfig {
        max_states: 100,
        max_non_loop_transitions: 1_000,
        max_time_seconds: 10.0,
        pick_split: PickSplit::MaxRefined,
        ..CegarConfig::default()
    };
    let mut result = cegar::run(&pre.task, &pre.dtgs, pre.task.goal.clone(), &costs, &config);

    assert!(result.abstraction.num_states() <= 1 + 3, "converges in at most 3 refinements");
    let solution = result.search.find_solution(&result.abstraction, &costs).expect("goal reachable");
    assert_eq!(solution.cost, 3);
    assert_eq!(result.search.h_value(result.abstraction.init_state()), 3);
}

#[test]
fn scenario_5_cost_saturated_additivity() {
    let mut variables = RefStore::new();
    let v0 = variables.push(var("v0", 2));
    let v1 = variables.push(var("v1", 2));
    let mut operators = RefStore::new();
    operators.push(Operator {
        name: "o0".into(),
        preconditions: vec![],
        effects: vec![Effect { fact: Fact::new(v0, 1), precondition_value: Some(0), conditions: vec![] }],
        cost: 1,
    });
    operators.push(Operator {
        name: "o1".into(),
        preconditions: vec![],
        effects: vec![Effect { fact: Fact::new(v1, 1), precondition_value: Some(0), conditions: vec![] }],
        cost: 1,
    });
    let raw = Task::new(variables, operators, RefStore::new(), vec![], vec![0, 0], vec![Fact::new(v0, 1), Fact::new(v1, 1)], false).unwrap();
    let pre = sas_task::preprocess(&raw, true).unwrap();

    let find_var = |name: &str| pre.task.variables.keys().find(|&v| pre.task.variables[v].name == name).unwrap();
    let v0_new = find_var("v0");
    let v1_new = find_var("v1");
    let subtasks = vec![SubtaskGoal { goal: vec![Fact::new(v0_new, 1)] }, SubtaskGoal { goal: vec![Fact::new(v1_new, 1)] }];
    let config = CegarConfig { max_states: 100, max_non_loop_transitions: 1_000, max_time_seconds: 10.0, ..CegarConfig::default() };
    let components = build_additive_heuristics(&pre.task, &pre.dtgs, subtasks, &config);

    assert_eq!(components.len(), 2, "both subtasks contribute a non-trivial component");
    let total: i64 = components.iter().map(|c| c.value(&pre.task.initial_state)).sum();
    assert_eq!(total, 2, "h_A(init) + h_B(init) = 2");
}
