use crate::{AnyValue, ExecutionResult, StateError, Stateful};

#[test]
fn test_loading() {
    let loading: Stateful<i32> = Stateful::loading(None);
    assert!(loading.is_loading());
    assert!(!loading.is_complete());
    assert!(loading.loading_hint().is_none());
    assert_eq!(loading.value_ref(), None);
    assert_eq!(loading, Stateful::default());

    let loading: Stateful<i32> = Stateful::loading_with(0.25f32);
    let hint = loading.loading_hint().expect("hint");
    assert!(hint.is::<f32>());
    assert_eq!(hint.downcast_ref::<f32>(), Some(&0.25));
    assert_eq!(hint.type_name(), "f32");
}

#[test]
fn test_success() {
    let success = Stateful::success(8);
    assert!(success.is_success());
    assert!(success.is_complete());
    assert!(!success.is_loading());
    assert_eq!(success.value_ref(), Some(&8));
    assert_eq!(success.error_ref(), None);
    assert_eq!(success.value(), Some(8));

    let nullable: Stateful<Option<i32>> = Stateful::success(None);
    assert!(nullable.is_success());
    assert_eq!(nullable.value(), Some(None));
}

#[test]
fn test_error() {
    let error: Stateful<i32> = Stateful::error_with_message("Connection failed");
    assert!(error.is_error());
    assert!(error.is_complete());
    assert!(!error.is_error_with_cancelled());
    assert_eq!(error.value_ref(), None);
    assert_eq!(
        error.error_ref(),
        Some(&StateError::Message("Connection failed".to_string()))
    );

    let cancelled: Stateful<i32> = Stateful::cancelled();
    assert!(cancelled.is_error_with_cancelled());
}

#[test]
fn test_map_relays_non_success() {
    let hint = AnyValue::new("halfway");
    let loading: Stateful<i32> = Stateful::loading(Some(hint.clone()));
    assert_eq!(loading.map(|v| v + 1), Stateful::loading(Some(hint)));

    let error: Stateful<i32> = Stateful::error("nope");
    assert_eq!(error.map(|v| v + 1), Stateful::error("nope"));

    assert_eq!(Stateful::success(1).map(|v| v + 1), Stateful::success(2));
}

#[test]
fn test_retype() {
    let error: Stateful<i32> = Stateful::error("nope");
    assert_eq!(error.retype::<String>(), Ok(Stateful::error("nope")));

    let success = Stateful::success(3);
    assert_eq!(success.retype::<String>(), Err(&3));
}

#[test]
fn test_execution_result() {
    let value: Stateful<u32> = 5u32.into_stateful();
    assert_eq!(value, Stateful::success(5));

    let ok: Stateful<u32> = Ok::<u32, &str>(6).into_stateful();
    assert_eq!(ok, Stateful::success(6));

    let err: Stateful<u32> = Err::<u32, &str>("Operation failed").into_stateful();
    assert_eq!(err, Stateful::error_with_message("Operation failed"));

    let io: Stateful<u32> =
        Err::<u32, std::io::Error>(std::io::Error::other("disk gone")).into_stateful();
    assert_eq!(io.error_ref().map(ToString::to_string), Some("disk gone".to_string()));

    let from: Stateful<u32> = Result::<u32, String>::Err("bad".to_string()).into();
    assert_eq!(from, Stateful::error_with_message("bad"));
}

#[test]
fn test_error_kinds() {
    assert!(StateError::Cancelled.is_cancelled());
    assert!(StateError::type_mismatch("i32", "null").is_type_mismatch());
    assert!(StateError::Panicked("boom".to_string()).is_panicked());
    assert!(StateError::Http {
        status: 500,
        message: "oops".to_string()
    }
    .is_http());
    assert_eq!(
        StateError::type_mismatch("i32", "&str").to_string(),
        "expected a value of type `i32` but found `&str`"
    );
    assert_eq!(StateError::Cancelled.to_string(), "Task was cancelled!");
}
