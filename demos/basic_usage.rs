//! 基本使用示例
//!
//! 本示例展示了 Veneer 页面增强内核的基本使用方法，包括：
//!
//! - 注册模块描述符
//! - 启动内核并等待模块落定
//! - 读写子选项
//! - 停用模块并执行清理
//!
//! # 运行示例
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use serde_json::json;
use veneer_core::{CoreConfig, ModuleDescriptor, Suboption, VeneerCore};

/// 主函数
///
/// 演示 Veneer 内核的基本用法。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Veneer 页面增强内核基本使用示例 ===\n");

    // -------------------------------------------------------------------------
    // 1. 创建内核
    // -------------------------------------------------------------------------
    println!("1. 使用默认配置创建内核...");

    let config = CoreConfig::default();
    println!("   配置信息:");
    println!("   - 启动时启用全部模块: {}", config.modules.enable_all);
    println!("   - 落定超时: {} 毫秒", config.modules.settle_timeout_ms);

    let core = VeneerCore::new(config);
    println!("   内核已创建，状态: {}\n", core.state().await);

    // -------------------------------------------------------------------------
    // 2. 注册模块
    // -------------------------------------------------------------------------
    println!("2. 注册模块...");

    let theme = ModuleDescriptor::builder("theme", "页面主题")
        .description("定制页面配色和暗色模式")
        .suboption(Suboption::color("accent-color", "主题色", "#1a73e8"))
        .suboption(Suboption::boolean("dark", "暗色模式", false))
        .main(|options, ctx| async move {
            println!("   [theme] 激活，主题色 = {}", options["accent-color"]);
            ctx.add_function(|| println!("   [theme] 清理：还原页面样式"))
                .await;
            Ok(())
        })
        .build()?;

    let quick_links = ModuleDescriptor::builder("quick-links", "快捷链接")
        .init(|_options, _ctx| async {
            println!("   [quick-links] 一次性初始化");
            Ok(())
        })
        .main(|_options, ctx| async move {
            println!("   [quick-links] 激活");
            ctx.add_function(|| println!("   [quick-links] 清理：移除链接栏"))
                .await;
            Ok(())
        })
        .build()?;

    core.register_module(theme).await?;
    core.register_module(quick_links).await?;
    println!("   已注册 {} 个模块\n", core.list_modules().await.len());

    // -------------------------------------------------------------------------
    // 3. 写入子选项并启动
    // -------------------------------------------------------------------------
    println!("3. 写入子选项并启动内核...");

    core.set_option_value("theme", "accent-color", json!("#ff6d00"))
        .await?;

    let activated = core.start().await?;
    println!("   已派发 {} 个模块的激活任务", activated);

    let infos = core.settle().await?;
    for info in &infos {
        println!("   - {} => {}", info.module_id, info.state);
    }
    println!();

    // -------------------------------------------------------------------------
    // 4. 运行中启停单个模块
    // -------------------------------------------------------------------------
    println!("4. 运行中停用再启用模块...");

    core.disable_module("theme").await?;
    core.enable_module("theme").await?;
    core.settle().await?;
    println!();

    // -------------------------------------------------------------------------
    // 5. 关闭内核
    // -------------------------------------------------------------------------
    println!("5. 关闭内核...");

    let deactivated = core.shutdown().await?;
    println!("   已停用 {} 个模块，状态: {}", deactivated, core.state().await);

    println!("\n=== 示例结束 ===");
    Ok(())
}
