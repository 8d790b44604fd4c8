mod commands;
mod db;
mod gcal;
mod insights;
mod llm;
mod models;
mod schedule;
#[cfg(test)]
mod test_utils;

use db::AppState;
use std::sync::Arc;
use tauri::Manager;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tauri::Builder::default()
    .plugin(tauri_plugin_opener::init())
    .setup(|app| {
      // Initialize database
      let app_handle = app.handle().clone();
      tauri::async_runtime::block_on(async move {
        match db::initialize_db(&app_handle).await {
          Ok(pool) => {
            let state = Arc::new(AppState { db: pool });
            app_handle.manage(state);
            println!("Database ready");
          }
          Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
          }
        }
      });
      Ok(())
    })
    .invoke_handler(tauri::generate_handler![
      commands::get_cycles,
      commands::get_upcoming_doses,
      // Cycle commands
      commands::cycles::create_cycle,
      commands::cycles::update_cycle_schedule,
      commands::cycles::set_cycle_status,
      commands::cycles::delete_cycle,
      // Dose commands
      commands::doses::get_doses_in_range,
      commands::doses::get_cycle_doses,
      commands::doses::set_dose_status,
      // Calendar commands
      commands::calendar::calendar_start_auth,
      commands::calendar::calendar_complete_auth,
      commands::calendar::calendar_get_status,
      commands::calendar::calendar_set_sync_enabled,
      commands::calendar::calendar_sync_now,
      commands::calendar::calendar_disconnect,
      // Lab commands
      commands::labs::add_lab_result,
      commands::labs::import_lab_report,
      commands::labs::get_lab_results,
      commands::labs::delete_lab_result,
      // Wellness commands
      commands::wellness::log_side_effect,
      commands::wellness::get_side_effects,
      commands::wellness::log_body_metrics,
      commands::wellness::get_body_metrics,
      // Expense commands
      commands::expenses::add_expense,
      commands::expenses::get_expenses,
      commands::expenses::delete_expense,
      commands::expenses::get_spending_summary,
      commands::expenses::get_inventory_summary,
      // Insight commands
      commands::insights::generate_insight,
      commands::insights::get_insights,
    ])
    .run(tauri::generate_context!())
    .expect("error while running tauri application");
}
