use std::any::Any;

/// A trait for objects that can provide data containers to be held by `Context`
///
/// Each plugin type owns exactly one container per `Context`, so two
/// simulation runs in two contexts never share plugin state.
pub trait DataPlugin: Any {
    type DataContainer: Any;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new type for storing data in Context.
///
/// ```
/// use flight_contagion::context::Context;
/// use flight_contagion::define_data_plugin;
///
/// define_data_plugin!(Counter, usize, 0);
///
/// let mut context = Context::new();
/// *context.get_data_mut(Counter) += 1;
/// assert_eq!(context.get_data(Counter), Some(&1));
/// ```
#[macro_export]
macro_rules! define_data_plugin {
    ($vis:vis $data_plugin:ident, $data_container:ty, $default:expr) => {
        #[derive(Copy, Clone)]
        $vis struct $data_plugin;

        impl $crate::data_plugin::DataPlugin for $data_plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;
