//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static STOP: Emoji<'_, '_> = Emoji("🛑 ", "[STOP]");

// Stage indicators
pub static PLAN: Emoji<'_, '_> = Emoji("📋 ", "[P]");
pub static CODE: Emoji<'_, '_> = Emoji("💻 ", "[C]");
pub static TEST: Emoji<'_, '_> = Emoji("🔍 ", "[T]");
pub static FIX: Emoji<'_, '_> = Emoji("🔧 ", "[F]");

// Files
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
