//! OpenCL backend.
//!
//! The kernel source is an external collaborator handed in at context
//! construction; this module compiles it once, keeps the device/program pair
//! alive for reuse, and performs one upload/launch/readback round trip per
//! multiply. Transient per-call objects (queue, kernel, buffers) are released
//! when the call returns.

pub mod bindings;

use std::ffi::c_void;
use std::mem;
use std::ptr;

use crate::backend::{dispatch_pair, AnyMat, AnyView, ComputeBackend};
use crate::dtype::{DType, Element};
use crate::error::{MatError, Result};
use crate::mat::Mat;
use crate::view::View;

use self::bindings::*;

/// Device buffer sizes are rounded up to this many bytes.
const BUFFER_ALIGN: usize = 64;

fn cl_size_round(size_bytes: usize) -> usize {
    (size_bytes + BUFFER_ALIGN - 1) & !(BUFFER_ALIGN - 1)
}

fn cl_try(call: &'static str, code: cl_int) -> Result<()> {
    if code != CL_SUCCESS {
        log::debug!("{} failed with status {}", call, code);
        return Err(MatError::OpenCl { call, code });
    }
    Ok(())
}

/// A compiled OpenCL kernel context: platform, GPU device, and the program
/// built from the injected kernel source.
///
/// Construct one explicitly and share it across backend calls; after
/// construction it is immutable, so concurrent multiplies only read the
/// cached device/program handles.
#[derive(Debug)]
pub struct ClContext {
    device: cl_device_id,
    context: cl_context,
    program: cl_program,
}

// The handles are only read after construction, and the OpenCL runtime
// guarantees thread-safe API calls on them.
unsafe impl Send for ClContext {}
unsafe impl Sync for ClContext {}

impl ClContext {
    /// Pick the first platform's first GPU device and compile `source`.
    pub fn new(source: &str) -> Result<Self> {
        let mut platform: cl_platform_id = ptr::null_mut();
        cl_try("clGetPlatformIDs", unsafe {
            clGetPlatformIDs(1, &mut platform, ptr::null_mut())
        })?;

        let mut device: cl_device_id = ptr::null_mut();
        cl_try("clGetDeviceIDs", unsafe {
            clGetDeviceIDs(platform, CL_DEVICE_TYPE_GPU, 1, &mut device, ptr::null_mut())
        })?;

        let mut err: cl_int = CL_SUCCESS;
        let context =
            unsafe { clCreateContext(ptr::null(), 1, &device, None, ptr::null_mut(), &mut err) };
        cl_try("clCreateContext", err)?;

        let src_ptr = source.as_ptr() as *const i8;
        let src_len = source.len();
        let program =
            unsafe { clCreateProgramWithSource(context, 1, &src_ptr, &src_len, &mut err) };
        if err != CL_SUCCESS {
            unsafe { clReleaseContext(context) };
            return Err(MatError::OpenCl {
                call: "clCreateProgramWithSource",
                code: err,
            });
        }

        let build = unsafe {
            clBuildProgram(program, 0, ptr::null(), ptr::null(), None, ptr::null_mut())
        };
        if build != CL_SUCCESS {
            unsafe {
                clReleaseProgram(program);
                clReleaseContext(context);
            }
            return Err(MatError::OpenCl {
                call: "clBuildProgram",
                code: build,
            });
        }

        log::debug!("opencl context ready, program compiled");
        Ok(ClContext {
            device,
            context,
            program,
        })
    }
}

impl Drop for ClContext {
    fn drop(&mut self) {
        unsafe {
            clReleaseProgram(self.program);
            clReleaseContext(self.context);
        }
    }
}

// Transient per-call handles, released when the call returns.
struct Queue(cl_command_queue);
impl Drop for Queue {
    fn drop(&mut self) {
        unsafe { clReleaseCommandQueue(self.0) };
    }
}

struct Kernel(cl_kernel);
impl Drop for Kernel {
    fn drop(&mut self) {
        unsafe { clReleaseKernel(self.0) };
    }
}

struct Buffer(cl_mem);
impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { clReleaseMemObject(self.0) };
    }
}

unsafe fn set_arg<A>(kernel: cl_kernel, index: u32, value: &A) -> cl_int {
    clSetKernelArg(
        kernel,
        index,
        mem::size_of::<A>(),
        value as *const A as *const c_void,
    )
}

/// OpenCL compute backend over an injected [`ClContext`].
#[derive(Debug)]
pub struct ClBackend {
    ctx: ClContext,
}

impl ClBackend {
    pub fn new(ctx: ClContext) -> Self {
        ClBackend { ctx }
    }

    /// The kernel entry point for one element type.
    fn kernel_name(dtype: DType) -> &'static [u8] {
        match dtype {
            DType::I64 => b"matmul_i64\0",
            DType::F32 => b"matmul_f32\0",
        }
    }

    fn run_kernel<T: Element>(&self, lhs: View<'_, T>, rhs: View<'_, T>) -> Result<Mat<T>> {
        assert_eq!(
            lhs.width(),
            rhs.height(),
            "opencl: lhs width must equal rhs height"
        );

        let ctx = &self.ctx;
        let mut out = Mat::<T>::new(rhs.width(), lhs.height());

        let elem = mem::size_of::<T>();
        let lhs_bytes = lhs.data_len() * elem;
        let rhs_bytes = rhs.data_len() * elem;
        let out_bytes = out.as_slice().len() * elem;

        let mut err: cl_int = CL_SUCCESS;

        let queue = unsafe {
            clCreateCommandQueueWithProperties(ctx.context, ctx.device, ptr::null(), &mut err)
        };
        cl_try("clCreateCommandQueueWithProperties", err)?;
        let queue = Queue(queue);

        let kernel_name = Self::kernel_name(T::DTYPE);
        let kernel =
            unsafe { clCreateKernel(ctx.program, kernel_name.as_ptr() as *const i8, &mut err) };
        cl_try("clCreateKernel", err)?;
        let kernel = Kernel(kernel);

        let lhs_buf = unsafe {
            clCreateBuffer(
                ctx.context,
                CL_MEM_READ_ONLY,
                cl_size_round(lhs_bytes),
                ptr::null_mut(),
                &mut err,
            )
        };
        cl_try("clCreateBuffer", err)?;
        let lhs_buf = Buffer(lhs_buf);

        let rhs_buf = unsafe {
            clCreateBuffer(
                ctx.context,
                CL_MEM_READ_WRITE,
                cl_size_round(rhs_bytes),
                ptr::null_mut(),
                &mut err,
            )
        };
        cl_try("clCreateBuffer", err)?;
        let rhs_buf = Buffer(rhs_buf);

        let out_buf = unsafe {
            clCreateBuffer(
                ctx.context,
                CL_MEM_READ_WRITE,
                cl_size_round(out_bytes),
                ptr::null_mut(),
                &mut err,
            )
        };
        cl_try("clCreateBuffer", err)?;
        let out_buf = Buffer(out_buf);

        // The kernel takes (buffer, width, height, stride) for each of
        // lhs/rhs/out: twelve arguments in all.
        let lhs_w = lhs.width() as u32;
        let lhs_h = lhs.height() as u32;
        let lhs_s = lhs.stride() as u32;
        let rhs_w = rhs.width() as u32;
        let rhs_h = rhs.height() as u32;
        let rhs_s = rhs.stride() as u32;
        let out_w = out.width() as u32;
        let out_h = out.height() as u32;
        let out_s = out.stride() as u32;

        let code = unsafe {
            let mut code = set_arg(kernel.0, 0, &lhs_buf.0);
            code |= set_arg(kernel.0, 1, &lhs_w);
            code |= set_arg(kernel.0, 2, &lhs_h);
            code |= set_arg(kernel.0, 3, &lhs_s);

            code |= set_arg(kernel.0, 4, &rhs_buf.0);
            code |= set_arg(kernel.0, 5, &rhs_w);
            code |= set_arg(kernel.0, 6, &rhs_h);
            code |= set_arg(kernel.0, 7, &rhs_s);

            code |= set_arg(kernel.0, 8, &out_buf.0);
            code |= set_arg(kernel.0, 9, &out_w);
            code |= set_arg(kernel.0, 10, &out_h);
            code |= set_arg(kernel.0, 11, &out_s);
            code
        };
        cl_try("clSetKernelArg", code)?;

        let mut local_size: usize = 0;
        cl_try("clGetKernelWorkGroupInfo", unsafe {
            clGetKernelWorkGroupInfo(
                kernel.0,
                ctx.device,
                CL_KERNEL_WORK_GROUP_SIZE,
                mem::size_of::<usize>(),
                &mut local_size as *mut usize as *mut c_void,
                ptr::null_mut(),
            )
        })?;

        let global_size = out.width() * out.height();
        let local_size = local_size.min(global_size);

        cl_try("clEnqueueWriteBuffer", unsafe {
            clEnqueueWriteBuffer(
                queue.0,
                lhs_buf.0,
                CL_FALSE,
                0,
                lhs_bytes,
                lhs.as_ptr() as *const c_void,
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        })?;

        cl_try("clEnqueueWriteBuffer", unsafe {
            clEnqueueWriteBuffer(
                queue.0,
                rhs_buf.0,
                CL_FALSE,
                0,
                rhs_bytes,
                rhs.as_ptr() as *const c_void,
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        })?;

        cl_try("clEnqueueNDRangeKernel", unsafe {
            clEnqueueNDRangeKernel(
                queue.0,
                kernel.0,
                1,
                ptr::null(),
                &global_size,
                &local_size,
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        })?;

        cl_try("clFinish", unsafe { clFinish(queue.0) })?;

        cl_try("clEnqueueReadBuffer", unsafe {
            clEnqueueReadBuffer(
                queue.0,
                out_buf.0,
                CL_TRUE,
                0,
                out_bytes,
                out.as_mut_slice().as_mut_ptr() as *mut c_void,
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        })?;

        cl_try("clFinish", unsafe { clFinish(queue.0) })?;

        Ok(out)
    }
}

impl ComputeBackend for ClBackend {
    fn name(&self) -> &str {
        "opencl"
    }

    fn multiply(&self, lhs: AnyView<'_>, rhs: AnyView<'_>) -> Result<AnyMat> {
        dispatch_pair(
            lhs,
            rhs,
            |l, r| self.run_kernel(l, r).map(AnyMat::I64),
            |l, r| self.run_kernel(l, r).map(AnyMat::F32),
        )
    }
}
