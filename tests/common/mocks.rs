//! Mock of the value-substitution capability.
use mockall::mock;

use xml_mapper::core::ValueSubstitution;

mock! {
    pub Substitution {}
    impl ValueSubstitution for Substitution {
        fn on_write(&self, text: &str) -> String;
        fn on_read(&self, text: &str) -> String;
    }
}
