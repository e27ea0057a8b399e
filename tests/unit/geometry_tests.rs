// Geometry plan resolution for each action

use std::collections::HashMap;

use rstest::rstest;
use suzume::directive::{parse, Action, Gravity, ParserLimits};
use suzume::geometry::{gravity_anchor, plan_for, Dimensions, Point};

fn directive_for(path: &str) -> suzume::directive::TransformDirective {
    parse(path, &HashMap::new(), &ParserLimits::default()).directive
}

#[rstest]
#[case(Gravity::Center, 250, 150)]
#[case(Gravity::North, 250, 0)]
#[case(Gravity::NorthEast, 500, 0)]
#[case(Gravity::East, 500, 150)]
#[case(Gravity::SouthEast, 500, 300)]
#[case(Gravity::South, 250, 300)]
#[case(Gravity::SouthWest, 0, 300)]
#[case(Gravity::West, 0, 150)]
#[case(Gravity::NorthWest, 0, 0)]
fn anchor_grid(#[case] gravity: Gravity, #[case] x: u32, #[case] y: u32) {
    let container = Dimensions::new(1000, 800);
    let target = Dimensions::new(500, 500);
    assert_eq!(gravity_anchor(gravity, container, target), Point { x, y });
}

#[test]
fn anchor_centers_odd_spans_by_flooring() {
    let anchor = gravity_anchor(
        Gravity::Center,
        Dimensions::new(101, 51),
        Dimensions::new(100, 50),
    );
    assert_eq!(anchor, Point { x: 0, y: 0 });
}

#[test]
fn crop_scales_to_cover_then_crops_center() {
    // 200x100 source, 100x100 target: height limits, width is cropped
    let d = directive_for("/h100-w100/a.jpg");
    let plan = plan_for(&d, Dimensions::new(200, 100));

    assert_eq!(plan.resize, Dimensions::new(200, 100));
    let crop = plan.crop.unwrap();
    assert_eq!((crop.width, crop.height), (100, 100));
    assert_eq!((crop.x, crop.y), (50, 0));
    assert!(plan.pad.is_none());
}

#[test]
fn crop_with_east_gravity_pins_right_edge() {
    let d = directive_for("/h100-w100-ge/a.jpg");
    let plan = plan_for(&d, Dimensions::new(200, 100));
    let crop = plan.crop.unwrap();
    assert_eq!((crop.x, crop.y), (100, 0));
}

#[test]
fn crop_upscales_small_sources() {
    let d = directive_for("/s100/a.jpg");
    let plan = plan_for(&d, Dimensions::new(50, 40));

    // Scale by 100/40 = 2.5 so both axes cover the square
    assert_eq!(plan.resize, Dimensions::new(125, 100));
    let crop = plan.crop.unwrap();
    assert_eq!((crop.width, crop.height), (100, 100));
}

#[test]
fn explicit_offsets_override_gravity_and_clamp() {
    let d = directive_for("/h100-w100-x500-y0/a.jpg");
    let plan = plan_for(&d, Dimensions::new(200, 100));
    let crop = plan.crop.unwrap();
    // x=500 is clamped to the right-most valid origin
    assert_eq!((crop.x, crop.y), (100, 0));
}

#[test]
fn pad_scales_to_fit_and_centers() {
    // 600x400 into 300x500: width limits, scale 0.5
    let d = directive_for("/h500-w300-cpad/a.jpg");
    let plan = plan_for(&d, Dimensions::new(600, 400));

    assert_eq!(plan.resize, Dimensions::new(300, 200));
    assert!(plan.crop.is_none());
    let pad = plan.pad.unwrap();
    assert_eq!(pad.size, Dimensions::new(300, 500));
    assert_eq!(pad.origin, Point { x: 0, y: 150 });
    assert_eq!(pad.color, None);
}

#[test]
fn pad_carries_background_color_and_gravity() {
    let d = directive_for("/h500-w300-cpad-b102030-gn/a.jpg");
    let plan = plan_for(&d, Dimensions::new(600, 400));
    let pad = plan.pad.unwrap();
    assert_eq!(pad.color, Some([0x10, 0x20, 0x30]));
    assert_eq!(pad.origin, Point { x: 0, y: 0 });
}

#[test]
fn resize_single_dimension_keeps_aspect() {
    let d = directive_for("/h50/a.jpg");
    let plan = plan_for(&d, Dimensions::new(100, 200));
    assert_eq!(plan.resize, Dimensions::new(25, 50));
    assert!(plan.crop.is_none() && plan.pad.is_none());
}

#[test]
fn resize_may_upscale() {
    let d = directive_for("/w400/a.jpg");
    let plan = plan_for(&d, Dimensions::new(100, 50));
    assert_eq!(plan.resize, Dimensions::new(400, 200));
}

#[test]
fn bounded_original_never_upscales() {
    let limits = ParserLimits {
        default_quality: 80,
        max_dimension: Some(1000),
    };
    let d = parse("/a.jpg", &HashMap::new(), &limits).directive;
    assert_eq!(d.action, Action::Original);

    // Source already inside the box: identity
    let source = Dimensions::new(640, 480);
    let plan = plan_for(&d, source);
    assert!(plan.is_identity(source));

    // Oversized source shrinks to fit
    let plan = plan_for(&d, Dimensions::new(2000, 1000));
    assert_eq!(plan.resize, Dimensions::new(1000, 500));
}

#[test]
fn json_plan_is_identity() {
    let d = directive_for("/a.jpg.json");
    let source = Dimensions::new(123, 456);
    assert!(plan_for(&d, source).is_identity(source));
}

#[test]
fn exact_fit_crop_is_not_identity() {
    // Same dimensions but a crop is still a crop plan
    let d = directive_for("/h100-w200/a.jpg");
    let plan = plan_for(&d, Dimensions::new(200, 100));
    assert_eq!(plan.resize, Dimensions::new(200, 100));
    let crop = plan.crop.unwrap();
    assert_eq!((crop.x, crop.y, crop.width, crop.height), (0, 0, 200, 100));
}
