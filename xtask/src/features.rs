use anyhow::{Context, Result};

/// spool-common feature tiers, each checked without default features
const COMMON_TIERS: &[&str] = &["foundation", "observability", "runtime", "test-utils"];

/// Check that every spool-common feature tier compiles on its own.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} spool-common feature tiers...", COMMON_TIERS.len());

    for (index, tier) in COMMON_TIERS.iter().enumerate() {
        println!(
            "\n[{}/{}] cargo check -p spool-common --no-default-features --features {tier}",
            index + 1,
            COMMON_TIERS.len()
        );

        super::cargo(&["check", "-p", "spool-common", "--no-default-features", "--features", tier])
            .with_context(|| format!("Feature tier '{tier}' failed to compile"))?;

        println!("✅ Tier '{tier}' compiled successfully");
    }

    println!("\n✅ All {} feature tiers compile successfully!", COMMON_TIERS.len());
    Ok(())
}
