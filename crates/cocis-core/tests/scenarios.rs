//! End-to-end construction scenarios

use cocis_core::prelude::*;
use cocis_test_utils::{
    isolated_registry, point_params, register_point, register_pool_connection, PoolConnection,
    Rectangle, Viewport, MAX_SIDE,
};
use cocis_types::MissingReason;
use pretty_assertions::assert_eq;

#[test]
fn pool_connection_singleton_constructs_once() {
    let registry = isolated_registry();
    let calls = register_pool_connection(&registry, "pool-connection", Policy::Singleton).unwrap();

    let a = registry.create("pool-connection", &Params::new()).unwrap();
    let b = registry.create("pool-connection", &Params::new()).unwrap();

    assert!(a.same_instance(&b));
    assert_eq!(a, b);
    assert_eq!(calls.get(), 1);
    assert_eq!(a.kind(), "pool-connection");
    assert_eq!(
        a.downcast_ref::<PoolConnection>().map(|c| c.serial),
        Some(0)
    );
}

#[test]
fn unknown_name_is_not_found() {
    let registry = isolated_registry();
    let err = registry.create("nonexistent", &Params::new()).unwrap_err();
    assert_eq!(err, ConstructionError::NotFound("nonexistent".into()));
}

#[test]
fn reregistering_a_name_is_rejected() {
    let registry = isolated_registry();
    register_point(&registry, "point", Policy::Fresh).unwrap();

    let err = register_point(&registry, "point", Policy::Cached).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);
    assert_eq!(registry.policy_of("point"), Some(Policy::Fresh));
}

#[test]
fn fresh_products_compare_by_value() {
    let registry = isolated_registry();
    let calls = register_point(&registry, "point", Policy::Fresh).unwrap();

    let a = registry.create("point", &point_params(1, 2)).unwrap();
    let b = registry.create("point", &point_params(1, 2)).unwrap();
    let c = registry.create("point", &point_params(2, 1)).unwrap();

    assert_eq!(a, b);
    assert!(!a.same_instance(&b));
    assert_ne!(a, c);
    assert_eq!(calls.get(), 3);
}

#[test]
fn cached_products_are_interned_per_params() {
    let registry = isolated_registry();
    let calls = register_point(&registry, "point", Policy::Cached).unwrap();

    let a = registry.create("point", &point_params(1, 2)).unwrap();
    let b = registry.create("point", &point_params(1, 2)).unwrap();
    let c = registry.create("point", &point_params(2, 1)).unwrap();

    assert!(a.same_instance(&b));
    assert!(!a.same_instance(&c));
    assert_eq!(calls.get(), 2);
}

#[test]
fn constructor_errors_reach_the_caller() {
    let registry = isolated_registry();
    register_point(&registry, "point", Policy::Cached).unwrap();

    let err = registry
        .create("point", &Params::new().with("x", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(registry.cache_stats().entry_count, 0);
}

#[test]
fn rectangle_with_defaults() {
    let rect = Rectangle::builder()
        .with_width(4)
        .with_height(3)
        .build()
        .unwrap();

    assert_eq!(
        rect,
        Rectangle {
            width: 4,
            height: 3,
            color: "black".to_string()
        }
    );
    assert_eq!(rect.area(), 12);
}

#[test]
fn rectangle_without_width_is_missing_required_field() {
    let err = Rectangle::builder().with_height(3).build().unwrap_err();
    assert_eq!(
        err,
        ConstructionError::MissingRequiredField {
            field: "width".to_string(),
            reason: MissingReason::Absent,
        }
    );
}

#[test]
fn rectangle_rejects_out_of_range_side() {
    let err = TypedSession::<Rectangle>::new(
        Params::new().with("width", MAX_SIDE + 1).with("height", 1),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ConstructionError::MissingRequiredField {
            reason: MissingReason::OutOfRange { .. },
            ..
        }
    ));
}

#[test]
fn rectangle_area_limit_is_deferred_to_build() {
    let mut builder = Rectangle::builder();
    builder.with_width(MAX_SIDE).with_height(MAX_SIDE).with_color("red");

    let err = builder.build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("area"));
}

#[test]
fn rectangle_builder_is_single_use() {
    let mut builder = Rectangle::builder();
    builder.with_width(2).with_height(2);

    builder.build().unwrap();
    assert_eq!(
        builder.build().unwrap_err(),
        ConstructionError::BuilderAlreadyConsumed
    );
}

#[test]
fn viewport_zoom_fails_fast() {
    let mut session = TypedSession::<Viewport>::staged().unwrap();
    session.set("zoom_max", 20).unwrap();

    let err = session.set("zoom_min", 30).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let viewport = session.set("title", "map").unwrap().build().unwrap();
    assert_eq!(
        viewport,
        Viewport {
            zoom_min: 1,
            zoom_max: 20,
            title: "map".to_string()
        }
    );
}

#[test]
fn facade_builds_typed_products() {
    let cocis = Cocis::isolated();
    let mut session = cocis.builder::<Rectangle>().unwrap();
    let rect = session.stage("width", 5).stage("height", 6).build().unwrap();
    assert_eq!(rect.area(), 30);
}
