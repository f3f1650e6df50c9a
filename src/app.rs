use eframe::egui;

use crate::auth::AuthContext;
use crate::config::AppConfig;
use crate::state::AppState;
use crate::ui::panels;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustySiftApp {
    pub state: AppState,
    pub config: AppConfig,
    /// Decided once at startup; unauthorised users get a blank window.
    authorized: bool,
}

impl RustySiftApp {
    pub fn new(config: AppConfig, auth: &AuthContext) -> Self {
        let authorized = auth.is_member_of(&config.org_substring);
        if authorized {
            log::info!("Access granted to {}", auth.qualified_name());
        } else {
            log::warn!("Access denied to {}", auth.qualified_name());
        }
        Self {
            state: AppState::default(),
            config,
            authorized,
        }
    }
}

impl eframe::App for RustySiftApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.authorized {
            egui::CentralPanel::default().show(ctx, |_ui| {});
            return;
        }

        // ---- Top panel: title and page switcher ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: uploads and filters ----
        let view = egui::SidePanel::left("filter_panel")
            .default_width(320.0)
            .resizable(true)
            .show(ctx, |ui| panels::side_panel(ui, &mut self.state, &self.config))
            .inner;

        // ---- Central panel: filtered table ----
        egui::CentralPanel::default().show(ctx, |ui| {
            panels::central_panel(ui, &self.state, &view);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_uses_the_configured_organisation() {
        let config = AppConfig {
            org_substring: "Contoso".into(),
            ..AppConfig::default()
        };
        assert!(RustySiftApp::new(config.clone(), &AuthContext::new("ann", "CONTOSO")).authorized);
        assert!(!RustySiftApp::new(config, &AuthContext::new("ann", "FABRIKAM")).authorized);
    }
}
