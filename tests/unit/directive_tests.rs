// Directive parsing behavior across the URL token grammar

use std::collections::HashMap;

use rstest::rstest;
use suzume::codec::format::OutputFormat;
use suzume::config::PresetConfig;
use suzume::directive::{parse, Action, CropMode, Gravity, ParserLimits, ParsedRequest};

fn parse_path(path: &str) -> ParsedRequest {
    parse(path, &HashMap::new(), &ParserLimits::default())
}

fn parse_with_limits(path: &str, limits: ParserLimits) -> ParsedRequest {
    parse(path, &HashMap::new(), &limits)
}

#[rstest]
#[case("/image.jpg", Action::Original)]
#[case("/h200/image.jpg", Action::Resize)]
#[case("/w300/image.jpg", Action::Resize)]
#[case("/h200-w300/image.jpg", Action::Crop)]
#[case("/s150/image.jpg", Action::Square)]
#[case("/h200-w300-cpad/image.jpg", Action::Pad)]
#[case("/image.jpg.json", Action::Json)]
#[case("/h200/image.jpg.json", Action::Json)]
fn action_derivation(#[case] path: &str, #[case] expected: Action) {
    assert_eq!(parse_path(path).directive.action, expected);
}

#[test]
fn square_sets_both_dimensions_and_fill_crop() {
    let parsed = parse_path("/s120-cpad/image.jpg");
    assert_eq!(parsed.directive.action, Action::Square);
    assert_eq!(parsed.directive.width, Some(120));
    assert_eq!(parsed.directive.height, Some(120));
    // Square always fill-crops, even with a conflicting crop token
    assert_eq!(parsed.directive.crop_mode, CropMode::Fill);
}

#[test]
fn pad_with_one_dimension_resolves_the_other() {
    let parsed = parse_path("/w300-cpad/image.jpg");
    assert_eq!(parsed.directive.action, Action::Pad);
    assert_eq!(parsed.directive.width, Some(300));
    assert_eq!(parsed.directive.height, Some(300));
}

#[rstest]
#[case("gc", Gravity::Center)]
#[case("gn", Gravity::North)]
#[case("gne", Gravity::NorthEast)]
#[case("ge", Gravity::East)]
#[case("gse", Gravity::SouthEast)]
#[case("gs", Gravity::South)]
#[case("gsw", Gravity::SouthWest)]
#[case("gw", Gravity::West)]
#[case("gnw", Gravity::NorthWest)]
fn gravity_codes(#[case] token: &str, #[case] expected: Gravity) {
    let parsed = parse_path(&format!("/s50-{}/image.jpg", token));
    assert_eq!(parsed.directive.gravity, expected);
}

#[test]
fn malformed_tokens_are_discarded_individually() {
    // Bad height value, good width value: width survives
    let parsed = parse_path("/habc-w300/image.jpg");
    assert_eq!(parsed.directive.height, None);
    assert_eq!(parsed.directive.width, Some(300));
    assert_eq!(parsed.directive.action, Action::Resize);
}

#[test]
fn zero_dimensions_are_discarded() {
    let parsed = parse_path("/h0-w0/image.jpg");
    assert_eq!(parsed.directive.action, Action::Original);
}

#[test]
fn quality_is_clamped_into_range() {
    assert_eq!(parse_path("/h10-q500/image.jpg").directive.quality, 100);
    assert_eq!(parse_path("/h10-q0/image.jpg").directive.quality, 1);
    assert_eq!(parse_path("/h10-q55/image.jpg").directive.quality, 55);
}

#[test]
fn default_quality_comes_from_limits() {
    let limits = ParserLimits {
        default_quality: 60,
        max_dimension: None,
    };
    assert_eq!(
        parse_with_limits("/h10/image.jpg", limits).directive.quality,
        60
    );
}

#[test]
fn padding_color_requires_six_hex_digits() {
    let parsed = parse_path("/w300-cpad-bFF8800/image.jpg");
    assert_eq!(parsed.directive.padding_color, Some([0xFF, 0x88, 0x00]));

    let parsed = parse_path("/w300-cpad-bFFF/image.jpg");
    assert_eq!(parsed.directive.padding_color, None);

    let parsed = parse_path("/w300-cpad-bZZZZZZ/image.jpg");
    assert_eq!(parsed.directive.padding_color, None);
}

#[test]
fn explicit_offsets_parse() {
    let parsed = parse_path("/h100-w100-x20-y30/image.jpg");
    assert_eq!(parsed.directive.x, Some(20));
    assert_eq!(parsed.directive.y, Some(30));
}

#[test]
fn source_and_filter_tokens_lowercase() {
    let parsed = parse_path("/h100-eYouTube-fBlur/video.jpg");
    assert_eq!(parsed.directive.source.as_deref(), Some("youtube"));
    assert_eq!(parsed.directive.filter.as_deref(), Some("blur"));
}

#[test]
fn output_format_override_needs_doubled_extension() {
    let parsed = parse_path("/h100/image.jpg.webp");
    assert_eq!(parsed.directive.output_format, Some(OutputFormat::WebP));
    assert_eq!(parsed.image_name, "image.jpg");
    assert_eq!(parsed.source_path, "image.jpg");

    // Single extension is the input format, not an override
    let parsed = parse_path("/h100/image.webp");
    assert_eq!(parsed.directive.output_format, None);
    assert_eq!(parsed.image_name, "image.webp");
}

#[test]
fn json_suffix_wins_over_format_override() {
    let parsed = parse_path("/image.jpg.webp.json");
    assert_eq!(parsed.directive.action, Action::Json);
    assert_eq!(parsed.directive.output_format, None);
    assert_eq!(parsed.source_path, "image.jpg");
}

#[test]
fn directive_segment_is_removed_from_source_path() {
    let parsed = parse_path("/h200-w300/album/2024/photo.jpg");
    assert_eq!(parsed.source_path, "album/2024/photo.jpg");
    assert_eq!(parsed.image_name, "photo.jpg");
}

#[test]
fn non_directive_first_segment_stays_in_path() {
    // No recognized key with a value: ordinary path segment
    let parsed = parse_path("/album/photo.jpg");
    assert_eq!(parsed.directive.action, Action::Original);
    assert_eq!(parsed.source_path, "album/photo.jpg");
}

#[test]
fn bare_file_is_never_a_directive() {
    // A lone segment is always the file, even if it parses as tokens
    let parsed = parse_path("/h200.jpg");
    assert_eq!(parsed.directive.action, Action::Original);
    assert_eq!(parsed.source_path, "h200.jpg");
}

#[test]
fn percent_encoded_paths_decode() {
    let parsed = parse_path("/h100/my%20photos/image%201.jpg");
    assert_eq!(parsed.source_path, "my photos/image 1.jpg");
}

#[test]
fn max_dimension_clamps_explicit_values() {
    let limits = ParserLimits {
        default_quality: 80,
        max_dimension: Some(510),
    };
    let parsed = parse_with_limits("/h700-w60/image.jpg", limits);
    assert_eq!(parsed.directive.height, Some(510));
    assert_eq!(parsed.directive.width, Some(60));
}

#[test]
fn max_dimension_boxes_in_original_requests() {
    let limits = ParserLimits {
        default_quality: 80,
        max_dimension: Some(1024),
    };
    let parsed = parse_with_limits("/image.jpg", limits);
    assert_eq!(parsed.directive.action, Action::Original);
    assert_eq!(parsed.directive.width, Some(1024));
    assert_eq!(parsed.directive.height, Some(1024));
}

#[test]
fn preset_takes_priority_over_token_parse() {
    let mut presets = HashMap::new();
    presets.insert(
        "w100".to_string(),
        PresetConfig {
            height: Some(400),
            width: Some(400),
            quality: Some(90),
            ..Default::default()
        },
    );

    // "w100" is a valid token segment, but the preset shadows it
    let parsed = parse("/w100/image.jpg", &presets, &ParserLimits::default());
    assert_eq!(parsed.directive.width, Some(400));
    assert_eq!(parsed.directive.height, Some(400));
    assert_eq!(parsed.directive.quality, 90);
}

#[test]
fn preset_with_square_and_source() {
    let mut presets = HashMap::new();
    presets.insert(
        "thumb".to_string(),
        PresetConfig {
            square: Some(64),
            gravity: Some("n".to_string()),
            source: Some("s3".to_string()),
            ..Default::default()
        },
    );

    let parsed = parse("/thumb/avatars/me.png", &presets, &ParserLimits::default());
    assert_eq!(parsed.directive.action, Action::Square);
    assert_eq!(parsed.directive.width, Some(64));
    assert_eq!(parsed.directive.gravity, Gravity::North);
    assert_eq!(parsed.directive.source.as_deref(), Some("s3"));
    assert_eq!(parsed.source_path, "avatars/me.png");
}
