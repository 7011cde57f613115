//! End-to-end tests of generated dispatchers run by the interpreter backend.

use hookwire::{
    DIRECT_CALL_HOOK, Dispatcher, FrameworkDescriptor, Generator, GeneratorConfig, GeneratorError,
    HookTable, Hosted, MarshalError, MethodDescriptor, Object, Operation, Parameter, ReturnType,
    TypeDescriptor, downcast, into_object,
    testing::{CallLog, ScenarioPlugin, plugin_fixture},
};
use std::{sync::Arc, thread};

mod common;

use common::configs;

fn scenario(config: GeneratorConfig) -> (Dispatcher<ScenarioPlugin>, ScenarioPlugin, CallLog) {
    let log = CallLog::new();
    let dispatcher = plugin_fixture().dispatcher_with(config).unwrap();
    (dispatcher, ScenarioPlugin::new(log.clone()), log)
}

fn call(
    d: &Dispatcher<ScenarioPlugin>,
    p: &mut ScenarioPlugin,
    name: Option<&str>,
    args: &mut [Object],
) -> (Result<bool, MarshalError>, Option<Object>) {
    let mut result = Some(into_object("stale"));
    let handled = d.call(p, name, &mut result, args);
    (handled, result)
}

#[test]
fn test_null_or_empty_name_not_handled() {
    for config in configs() {
        let (d, mut p, log) = scenario(config);
        for name in [None, Some("")] {
            let (handled, result) = call(&d, &mut p, name, &mut []);
            assert_eq!(handled, Ok(false));
            assert!(result.is_none());
        }
        assert!(log.is_empty());
    }
}

#[test]
fn test_scenario_from_hook_names() {
    for config in configs() {
        let (d, mut p, log) = scenario(config);

        assert_eq!(call(&d, &mut p, Some("Init"), &mut []).0, Ok(true));
        assert_eq!(
            call(&d, &mut p, Some("InitUser"), &mut [into_object(String::from("bob"))]).0,
            Ok(true)
        );
        assert_eq!(call(&d, &mut p, Some("InitUserX"), &mut []).0, Ok(false));
        assert_eq!(call(&d, &mut p, Some(""), &mut []).0, Ok(false));

        assert_eq!(log.entries(), ["Init()", "InitUser(bob)"]);
    }
}

#[test]
fn test_full_signature_keys() {
    for config in configs() {
        let (d, mut p, log) = scenario(config);
        let mut args = [
            into_object(String::from("bob")),
            into_object(String::from("admins")),
        ];

        assert_eq!(
            call(&d, &mut p, Some("InitUserGroup(String, String)"), &mut args).0,
            Ok(true)
        );
        assert_eq!(
            call(&d, &mut p, Some("InitUser(String)"), &mut args[..1]).0,
            Ok(true)
        );
        assert_eq!(log.entries(), ["InitUserGroup(bob, admins)", "InitUser(bob)"]);
    }
}

#[test]
fn test_prefix_names_never_cross_match() {
    for config in configs() {
        let (d, mut p, log) = scenario(config);

        // Prefixes of registered keys.
        for name in ["I", "In", "Ini", "InitU", "InitUserG", "InitUser(", "InitUser(String"] {
            assert_eq!(call(&d, &mut p, Some(name), &mut []).0, Ok(false), "{name}");
        }
        // Extensions of registered keys.
        for name in ["Init ", "InitUser(String)x", "InitUserGroupX"] {
            assert_eq!(call(&d, &mut p, Some(name), &mut []).0, Ok(false), "{name}");
        }
        assert!(log.is_empty());

        call(&d, &mut p, Some("Init"), &mut []).0.unwrap();
        assert_eq!(log.count("Init()"), 1);
        assert_eq!(log.len(), 1);
    }
}

#[test]
fn test_by_ref_round_trip() {
    for config in configs() {
        let (d, mut p, _log) = scenario(config);
        let mut args = [into_object(5i32)];

        let (handled, result) = call(&d, &mut p, Some("Increment"), &mut args);
        assert_eq!(handled, Ok(true));
        assert!(result.is_none());
        assert_eq!(downcast::<i32>(&args[0]), Some(&6));
    }
}

#[test]
fn test_return_value_is_boxed() {
    let (d, mut p, log) = scenario(GeneratorConfig::default());
    let mut args = [into_object(2i32), into_object(40i32)];

    let (handled, result) = call(&d, &mut p, Some("Sum(i32, i32)"), &mut args);
    assert_eq!(handled, Ok(true));
    assert_eq!(result.as_ref().and_then(downcast::<i32>), Some(&42));
    assert_eq!(log.entries(), ["Sum"]);
}

#[test]
fn test_public_untagged_method_unreachable() {
    let (d, mut p, _log) = scenario(GeneratorConfig::default());
    assert_eq!(call(&d, &mut p, Some("Describe"), &mut []).0, Ok(false));
}

#[test]
fn test_disjoint_name_rejected_after_first_comparison() {
    for config in configs() {
        let (d, mut p, _log) = scenario(config);
        let mut result = None;

        let (handled, stats) = d
            .call_with_stats(&mut p, Some("zzzzzzzzzzzzzzzzzzzzzzzzzzzz"), &mut result, &mut [])
            .unwrap();
        assert!(!handled);
        assert_eq!(stats.inspected, 1);
        // One test per root edge at most; never a scan of every hook.
        assert!(stats.compares <= 3);
    }
}

#[test]
fn test_wrong_arity_is_a_caller_error() {
    let (d, mut p, log) = scenario(GeneratorConfig::default());
    assert_eq!(
        call(&d, &mut p, Some("InitUser"), &mut []).0,
        Err(MarshalError::MissingArgument { index: 0, len: 0 })
    );
    assert!(log.is_empty());
}

#[test]
fn test_wrong_argument_type_is_a_caller_error() {
    let (d, mut p, _log) = scenario(GeneratorConfig::default());
    assert!(matches!(
        call(&d, &mut p, Some("Increment"), &mut [into_object("five")]).0,
        Err(MarshalError::ArgumentType { index: 0, .. })
    ));
}

#[test]
fn test_duplicate_signature_first_wins() {
    #[derive(Default)]
    struct Twice {
        hits: Vec<&'static str>,
    }

    let first = MethodDescriptor::new("OnChat", "Twice").param(Parameter::value("m", "String"));
    let second = MethodDescriptor::new("OnChat", "Twice")
        .param(Parameter::value("m", "String"))
        .returns(ReturnType::Value("bool".into()));
    let ty = TypeDescriptor::new("Twice")
        .with_method(first.clone())
        .with_method(second);

    let program = Generator::new(&FrameworkDescriptor::standard())
        .unwrap()
        .compile(&ty)
        .unwrap();
    assert_eq!(program.hooks().len(), 1);
    assert_eq!(program.hooks()[0].1, first);

    let mut table = HookTable::new();
    table.bind(&first, |t: &mut Twice, _| {
        t.hits.push("first");
        Ok(None)
    });
    let d = Dispatcher::new(program, table).unwrap();

    let mut t = Twice::default();
    let mut result = None;
    let mut args = [into_object(String::from("hi"))];
    assert_eq!(d.call(&mut t, Some("OnChat"), &mut result, &mut args), Ok(true));
    assert_eq!(t.hits, ["first"]);
    assert!(result.is_none());
}

#[test]
fn test_collapse_does_not_change_behaviour() {
    let names = [
        "Init",
        "InitUser",
        "InitUserGroup",
        "InitUserGroup(String, String)",
        "Increment",
        "Increment(&mut i32)",
        "Sum",
        "Summ",
        "Su",
        "Describe",
        "Ix",
    ];
    let (with, mut p1, log1) = scenario(GeneratorConfig::new());
    let (without, mut p2, log2) = scenario(GeneratorConfig::new().collapse_single_paths(false));

    for name in names {
        let mut args1 = args_for(name);
        let mut args2 = args_for(name);
        let a = call(&with, &mut p1, Some(name), &mut args1).0;
        let b = call(&without, &mut p2, Some(name), &mut args2).0;
        assert_eq!(a, b, "{name}");
    }
    assert_eq!(log1.entries(), log2.entries());

    let collapsed = with
        .program()
        .ops()
        .iter()
        .filter(|op| matches!(op, Operation::CompareName(_)))
        .count();
    assert!(collapsed > 0);
    assert!(with.program().len() < without.program().len());
}

fn args_for(name: &str) -> Vec<Object> {
    if name.starts_with("InitUserGroup") {
        vec![into_object(String::from("a")), into_object(String::from("b"))]
    } else if name.starts_with("Increment") {
        vec![into_object(1i32)]
    } else if name.starts_with("Sum") {
        vec![into_object(1i32), into_object(2i32)]
    } else {
        vec![into_object(String::from("u"))]
    }
}

#[test]
fn test_aliases_can_be_disabled() {
    let (d, mut p, _log) = scenario(GeneratorConfig::new().bare_name_aliases(false));
    let mut args = [into_object(String::from("bob"))];

    assert_eq!(call(&d, &mut p, Some("InitUser"), &mut args).0, Ok(false));
    assert_eq!(call(&d, &mut p, Some("InitUser(String)"), &mut args).0, Ok(true));
}

#[test]
fn test_generate_installs_contract_override() {
    let generator = Generator::new(&FrameworkDescriptor::standard()).unwrap();
    let mut ty = plugin_fixture().ty;

    generator.generate(&mut ty).unwrap();
    assert!(ty.find_declared(DIRECT_CALL_HOOK).is_some());
    assert!(matches!(
        generator.generate(&mut ty),
        Err(GeneratorError::AlreadyInstalled(_))
    ));
}

#[test]
fn test_missing_framework_contract_is_fatal() {
    assert!(matches!(
        Generator::new(&FrameworkDescriptor::new("empty")),
        Err(GeneratorError::ContractNotFound { .. })
    ));
}

#[test]
fn test_shared_dispatcher_across_threads() {
    let dispatcher = Arc::new(plugin_fixture().dispatcher().unwrap());
    let log = CallLog::new();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            let log = log.clone();
            thread::spawn(move || {
                let mut hosted = Hosted::new(ScenarioPlugin::new(log), dispatcher);
                for _ in 0..25 {
                    let mut result = None;
                    let mut args = [into_object(i), into_object(1i32)];
                    let handled = hookwire::DirectCallHook::direct_call_hook(
                        &mut hosted,
                        Some("Sum"),
                        &mut result,
                        &mut args,
                    );
                    assert_eq!(handled, Ok(true));
                    assert_eq!(result.as_ref().and_then(downcast::<i32>), Some(&(i + 1)));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(log.count("Sum"), 100);
}
