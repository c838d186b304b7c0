use kernel::KernelError;

/// Maps a backend failure onto the kernel's error kinds.
pub trait ConvertError {
    type Ok;
    fn convert_error(self) -> error_stack::Result<Self::Ok, KernelError>;
}
