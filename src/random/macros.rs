/// Use this to define a unique type which will be used as a key to retrieve
/// an independent rng instance when sampling through `ContextRandomExt`.
#[macro_export]
macro_rules! define_rng {
    ($vis:vis $random_id:ident) => {
        #[derive(Copy, Clone)]
        $vis struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $crate::rand::rngs::StdRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}
pub use define_rng;
