// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use qrscan::ResolutionTier;

#[test]
fn test_resolution_tier_values() {
    // Test that all tiers exist (Low, Medium, High, UltraHigh)
    assert_eq!(ResolutionTier::ALL.len(), 4);
}

#[test]
fn test_resolution_tier_ordering() {
    // Tiers are ordered from lowest to highest resolution
    let mut prev_pixels = 0u32;
    for tier in ResolutionTier::ALL {
        let (width, height) = tier.dimensions();
        assert!(
            width * height > prev_pixels,
            "Tiers should be ordered from lowest to highest"
        );
        prev_pixels = width * height;
    }
}

#[test]
fn test_host_index_mapping() {
    for tier in ResolutionTier::ALL {
        assert_eq!(ResolutionTier::from_index(tier.index()), tier);
    }

    // Out of range falls back to Medium
    assert_eq!(ResolutionTier::from_index(-1), ResolutionTier::Medium);
    assert_eq!(ResolutionTier::from_index(4), ResolutionTier::Medium);
}

#[test]
fn test_only_ultra_high_has_fallback() {
    assert_eq!(
        ResolutionTier::UltraHigh.fallback(),
        Some(ResolutionTier::High)
    );
    for tier in [
        ResolutionTier::Low,
        ResolutionTier::Medium,
        ResolutionTier::High,
    ] {
        assert_eq!(tier.fallback(), None);
    }
}

#[test]
fn test_resolution_tier_display_names() {
    for tier in ResolutionTier::ALL {
        let name = tier.display_name();
        assert!(!name.is_empty(), "Tier {:?} has empty display name", tier);
    }
}
