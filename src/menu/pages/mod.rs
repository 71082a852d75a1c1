//! Menu pages

pub mod certificate_page;
pub mod dependencies_page;
pub mod main_page;
pub mod mode_page;
pub mod registration_page;
pub mod service_page;

pub use certificate_page::CertificatePage;
pub use dependencies_page::DependenciesPage;
pub use main_page::MainPage;
pub use mode_page::ModePage;
pub use registration_page::RegistrationPage;
pub use service_page::ServicePage;
